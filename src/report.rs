use num_format::{Locale, ToFormattedString};
use prettytable::{format, Cell, Row, Table};

use crate::test::Test;

/// One row per test plus a totals row.
pub(crate) fn summary_table(tests: &[Test], real_time_secs: f64, sim_time_ns: f64) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(Row::new(
        ["TEST", "RESULT", "SIM TIME (ns)", "REAL TIME (s)", "RATIO (ns/s)"]
            .iter()
            .map(|t| Cell::new(t))
            .collect(),
    ));
    for t in tests {
        let result = t.outcome.as_ref().map_or("not run", |o| o.label());
        table.add_row(row_of(&t.name, result, t.sim_time_ns, t.time_secs));
    }
    let passed = tests.iter().filter(|t| t.passed()).count();
    let totals = format!("PASS={} FAIL={}", passed, tests.len() - passed);
    table.add_row(row_of("TOTAL", &totals, sim_time_ns, real_time_secs));
    table
}

fn row_of(name: &str, result: &str, sim_time_ns: f64, time_secs: f64) -> Row {
    let ratio = if time_secs > 0.0 {
        sim_time_ns / time_secs
    } else {
        0.0
    };
    Row::new(vec![
        Cell::new(name),
        Cell::new(result),
        Cell::new(&(sim_time_ns.round() as u64).to_formatted_string(&Locale::en)),
        Cell::new(&format!("{:.3}", time_secs)),
        Cell::new(&format!("{:.3}", ratio)),
    ])
}
