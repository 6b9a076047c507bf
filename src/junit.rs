use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};
use std::path::Path;

use crate::error::SimError;
use crate::test::{Test, TestOutcome};

pub(crate) fn create_junit_xml(suite: &str, tests: &[Test], path: &Path) -> Result<(), SimError> {
    let mut test_cases = Vec::new();

    for t in tests {
        let time = Duration::seconds_f64(t.time_secs);
        let tc = match &t.outcome {
            Some(TestOutcome::Passed(_)) => TestCaseBuilder::success(&t.name, time),
            Some(TestOutcome::Failed(msg)) => TestCaseBuilder::failure(&t.name, time, "failure", msg),
            Some(TestOutcome::Errored(msg)) => TestCaseBuilder::error(&t.name, time, "error", msg),
            None => TestCaseBuilder::skipped(&t.name),
        }
        .build();
        test_cases.push(tc);
    }

    let test_suite = TestSuiteBuilder::new(suite).add_testcases(test_cases).build();
    let report = ReportBuilder::new().add_testsuite(test_suite).build();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let file = std::fs::File::create(path)?;
    report
        .write_xml(file)
        .map_err(|e| SimError::Report(e.to_string()))?;
    tracing::info!(path = %path.display(), "wrote JUnit report");
    Ok(())
}
