use std::path::PathBuf;
use std::process::ExitCode;

use tbkit::bench::{count_10, count_to_16, counter_random_reset};
use tbkit::config::{self, ConfigError};
use tbkit::test_list;
use tbkit::testbench::Testbench;
use tracing_subscriber::EnvFilter;

fn run() -> Result<bool, ConfigError> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(config::CONFIG_FILE));
    let mut config = config::load_config(&path)?;
    config.apply_env();

    let tb = Testbench::from_config(&config)?;
    let mut tests = test_list![count_10, count_to_16, counter_random_reset];
    let summary = tb.run(&mut tests)?;
    Ok(summary.all_passed())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(2)
        }
    }
}
