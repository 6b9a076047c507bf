use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use crate::config::{ConfigError, TbConfig};
use crate::error::SimError;
use crate::executor::Task;
use crate::mem_sim::{MemSim, RunStatus};
use crate::signal::{self, SimObject};
use crate::sim_if::{self, SimIf};
use crate::test::{Test, TestOutcome};
use crate::value::Val;
use crate::{junit, report, time};

/// Counts of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

impl Summary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }
}

/// Runs tests one after another against a [`MemSim`].
pub struct Testbench {
    sim: Rc<MemSim>,
    suite: String,
    junit: Option<PathBuf>,
}

impl Testbench {
    pub fn new(sim: Rc<MemSim>) -> Self {
        Self {
            sim,
            suite: env!("CARGO_PKG_NAME").to_string(),
            junit: None,
        }
    }

    /// Declares the configured signals, the time limit and the outputs.
    pub fn from_config(config: &TbConfig) -> Result<Self, ConfigError> {
        let precision = config.precision_exp()?;
        let sim = MemSim::new(&config.sim.top, precision);
        for signal in &config.signals {
            sim.add_signal(&signal.name, signal.initial_value()?)?;
        }
        if let Some(limit_ns) = config.sim.max_time_ns {
            sim.set_time_limit(Some(time::to_steps(limit_ns as f64, "ns", precision)?));
        }
        if let Some(path) = &config.output.vcd {
            let file = File::create(path)?;
            sim.enable_vcd(Box::new(BufWriter::new(file)))?;
            tracing::info!(path = %path.display(), "recording waveform");
        }
        Ok(Self {
            sim: Rc::new(sim),
            suite: config.output.suite.clone(),
            junit: config.output.junit.clone(),
        })
    }

    pub fn with_junit(mut self, path: impl Into<PathBuf>) -> Self {
        self.junit = Some(path.into());
        self
    }

    /// Runs every test, then reports. Outcomes are stored in `tests`.
    pub fn run(&self, tests: &mut [Test]) -> Result<Summary, SimError> {
        self.start_of_simulation();
        let start = Instant::now();
        let sim_start = self.sim.get_sim_time_steps();

        for test in tests.iter_mut() {
            self.run_test(test)?;
        }

        let sim_time_ns = self.steps_to_ns(self.sim.get_sim_time_steps() - sim_start)?;
        self.end_of_simulation(tests, start.elapsed().as_secs_f64(), sim_time_ns)
    }

    fn start_of_simulation(&self) {
        sim_if::install(self.sim.clone());
        signal::clear_objects();
        crate::tear_down_tasks();
    }

    fn run_test(&self, test: &mut Test) -> Result<(), SimError> {
        tracing::info!(test = %test.name, "running test");
        let root = SimObject::get_root()?;
        let time_start = Instant::now();
        let sim_time_start = self.sim.get_sim_time_steps();

        let generator = test.generator;
        let handle = Task::spawn_from_future(
            async move {
                let result = (generator)(root).await;
                crate::finish_test(TestOutcome::from_result(result));
                Ok(Val::None)
            },
            &test.name,
        );
        if let Some(task) = handle.get_task() {
            crate::begin_test(task.clone());
        }

        let status = self.sim.run(|| !crate::test_running())?;
        if crate::test_running() {
            let outcome = match status {
                RunStatus::TimeLimit => {
                    TestOutcome::Failed("simulation time limit reached".to_string())
                }
                RunStatus::Exhausted | RunStatus::Stopped => TestOutcome::Errored(
                    "simulation ran out of events before the test finished".to_string(),
                ),
            };
            crate::finish_test(outcome);
        }
        // triggers a test registered after it ended
        crate::tear_down_tasks();
        let outcome = crate::take_outcome().unwrap_or_else(|| {
            TestOutcome::Errored("test ended without a result".to_string())
        });

        test.time_secs = time_start.elapsed().as_secs_f64();
        test.sim_time_ns = self.steps_to_ns(self.sim.get_sim_time_steps() - sim_time_start)?;
        match &outcome {
            TestOutcome::Passed(_) => tracing::info!(test = %test.name, "{}", outcome),
            _ => tracing::error!(test = %test.name, "{}", outcome),
        }
        test.set_outcome(outcome);
        Ok(())
    }

    fn end_of_simulation(
        &self,
        tests: &[Test],
        real_time_secs: f64,
        sim_time_ns: f64,
    ) -> Result<Summary, SimError> {
        let table = report::summary_table(tests, real_time_secs, sim_time_ns);
        tracing::info!("\n{}", table);

        if let Some(path) = &self.junit {
            junit::create_junit_xml(&self.suite, tests, path)?;
        }
        self.sim.finish_vcd()?;

        let mut summary = Summary::default();
        for t in tests {
            match &t.outcome {
                Some(TestOutcome::Passed(_)) => summary.passed += 1,
                Some(TestOutcome::Failed(_)) => summary.failed += 1,
                Some(TestOutcome::Errored(_)) | None => summary.errored += 1,
            }
        }
        Ok(summary)
    }

    fn steps_to_ns(&self, steps: u64) -> Result<f64, SimError> {
        time::from_steps(steps, "ns", self.sim.get_sim_precision())
    }
}
