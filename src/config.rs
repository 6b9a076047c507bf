//! Testbench configuration.
//!
//! Read from `tbkit.toml`; every section is optional. The `VCD` environment
//! variable set to `0` turns waveform output off.
//!
//! ```toml
//! [sim]
//! top = "top"
//! precision = "ps"
//! max_time_ns = 1000
//!
//! [output]
//! vcd = "waveform.vcd"
//! junit = "results.xml"
//!
//! [[signals]]
//! name = "clk"
//! width = 1
//! ```

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::SimError;
use crate::time;
use crate::value::LogicVec;

pub const CONFIG_FILE: &str = "tbkit.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Sim(#[from] SimError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TbConfig {
    pub sim: SimConfig,
    pub output: OutputConfig,
    pub signals: Vec<SignalConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Name of the top scope; signals are `<top>.<name>`.
    pub top: String,
    /// Unit of one simulator step.
    pub precision: String,
    /// Tests still running past this time fail.
    pub max_time_ns: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub vcd: Option<PathBuf>,
    pub junit: Option<PathBuf>,
    /// Test suite name in the JUnit report.
    pub suite: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignalConfig {
    pub name: String,
    pub width: u32,
    /// Binary (`0b0101`) or decimal. Zero when omitted.
    #[serde(default)]
    pub init: Option<String>,
}

impl SignalConfig {
    pub fn new(name: &str, width: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            init: None,
        }
    }

    pub fn initial_value(&self) -> Result<LogicVec, ConfigError> {
        let Some(init) = self.init.as_deref() else {
            return Ok(LogicVec::zeros(self.width));
        };
        let value = if init.starts_with("0b") {
            LogicVec::from_bin(init)?
        } else {
            let n: u64 = init.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("init of {} is not a number: {}", self.name, init))
            })?;
            if self.width < 64 && n >> self.width != 0 {
                return Err(ConfigError::Invalid(format!(
                    "init {} does not fit {} bits of {}",
                    n, self.width, self.name
                )));
            }
            LogicVec::from_u64(n, self.width)
        };
        if value.width() != self.width {
            return Err(ConfigError::Invalid(format!(
                "init of {} has {} bits, signal has {}",
                self.name,
                value.width(),
                self.width
            )));
        }
        Ok(value)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            top: "top".to_string(),
            precision: "ps".to_string(),
            max_time_ns: Some(1_000_000),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            vcd: Some(PathBuf::from("waveform.vcd")),
            junit: Some(PathBuf::from("results.xml")),
            suite: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

impl Default for TbConfig {
    /// The signals the bundled tests use.
    fn default() -> Self {
        Self {
            sim: SimConfig::default(),
            output: OutputConfig::default(),
            signals: vec![
                SignalConfig::new("clk", 1),
                SignalConfig::new("reset", 1),
                SignalConfig::new("count", 8),
                SignalConfig::new("my_signal_1", 8),
                SignalConfig::new("my_signal_2", 8),
            ],
        }
    }
}

impl TbConfig {
    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, var: impl Fn(&str) -> Option<String>) {
        if var("VCD").as_deref() == Some("0") {
            self.output.vcd = None;
        }
    }

    pub fn precision_exp(&self) -> Result<i8, ConfigError> {
        Ok(time::time_scale(&self.sim.precision)?)
    }
}

/// Loads `path`, or the defaults if it doesn't exist.
pub fn load_config(path: &Path) -> Result<TbConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(TbConfig::default());
    }
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<TbConfig, ConfigError> {
    let config: TbConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &TbConfig) -> Result<(), ConfigError> {
    if config.sim.top.is_empty() || config.sim.top.contains('.') {
        return Err(ConfigError::Invalid(format!("bad top name: {:?}", config.sim.top)));
    }
    config.precision_exp()?;
    let mut seen = HashSet::new();
    for signal in &config.signals {
        if signal.width == 0 {
            return Err(ConfigError::Invalid(format!("{} has width 0", signal.name)));
        }
        if !seen.insert(signal.name.as_str()) {
            return Err(ConfigError::Invalid(format!("{} declared twice", signal.name)));
        }
        signal.initial_value()?;
    }
    Ok(())
}
