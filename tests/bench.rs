use std::io::Write;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use tbkit::bench::{count_10, count_to_16, counter_random_reset};
use tbkit::config::{SignalConfig, TbConfig};
use tbkit::mem_sim::MemSim;
use tbkit::prelude::*;
use tbkit::sim_if;
use tbkit::test::TestOutcome;
use tbkit::test_list;
use tbkit::testbench::Testbench;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Captured {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

/// Runs `f` with log output captured.
fn with_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, captured.text())
}

fn dut(my_signal_1: u64, my_signal_2: u64) -> Rc<MemSim> {
    let sim = MemSim::new("top", -12);
    sim.add_signal("clk", LogicVec::zeros(1)).unwrap();
    sim.add_signal("my_signal_1", LogicVec::from_u64(my_signal_1, 8)).unwrap();
    sim.add_signal("my_signal_2", LogicVec::from_u64(my_signal_2, 8)).unwrap();
    Rc::new(sim)
}

fn counter_dut() -> Rc<MemSim> {
    let sim = MemSim::new("top", -12);
    sim.add_signal("clk", LogicVec::zeros(1)).unwrap();
    sim.add_signal("reset", LogicVec::zeros(1)).unwrap();
    sim.add_signal("count", LogicVec::zeros(8)).unwrap();
    sim.set_time_limit(Some(1_000_000));
    Rc::new(sim)
}

#[test]
fn count_10_passes_when_bit0_is_zero() {
    let tb = Testbench::new(dut(0b1010, 0b1110));
    let mut tests = test_list![count_10];
    let (summary, logs) = with_logs(|| tb.run(&mut tests).unwrap());

    assert!(summary.all_passed());
    assert_eq!(tests[0].outcome, Some(TestOutcome::Passed(String::new())));
    let lines = logs
        .lines()
        .filter(|l| l.contains("my_signal_1 is"))
        .collect::<Vec<_>>();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("my_signal_1 is 00001010"));
    assert!(lines[0].contains("sim_steps=0"));
    // the summary table is rendered into the log
    assert!(logs.contains("PASS=1 FAIL=0"));
}

#[test]
fn count_10_fails_when_bit0_is_one() {
    let tb = Testbench::new(dut(0, 0b0000_0001));
    let mut tests = test_list![count_10];
    let summary = tb.run(&mut tests).unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(
        tests[0].outcome,
        Some(TestOutcome::Failed("my_signal_2[0] is not 0!".to_string()))
    );
}

#[test]
fn count_10_only_checks_bit0() {
    let tb = Testbench::new(dut(0, 0b1111_1110));
    let mut tests = test_list![count_10];
    assert!(tb.run(&mut tests).unwrap().all_passed());
}

#[test]
fn missing_signal_is_an_error_not_a_failure() {
    let sim = MemSim::new("top", -12);
    sim.add_signal("clk", LogicVec::zeros(1)).unwrap();
    sim.add_signal("my_signal_1", LogicVec::zeros(8)).unwrap();
    let tb = Testbench::new(Rc::new(sim));
    let mut tests = test_list![count_10];
    let summary = tb.run(&mut tests).unwrap();

    assert_eq!(summary.errored, 1);
    assert_eq!(
        tests[0].outcome,
        Some(TestOutcome::Errored("signal not found: top.my_signal_2".to_string()))
    );
}

async fn sample_clock(dut: SimObject) -> RstbResult {
    let clk = dut.c("clk")?;
    Task::fork(Clock::new(clk, 2, "ns").start());
    // sample mid-phase, 1 ns = 1000 steps
    Trigger::timer_steps(500).await?;
    let mut samples = Vec::new();
    for _ in 0..6 {
        samples.push(clk.u64()?);
        Trigger::timer(1, "ns").await?;
    }
    tb_assert!(samples == [0, 1, 0, 1, 0, 1], "samples: {:?}", samples);

    // the simulator handle is not Send, so it is never held across an await
    let mut rising = Vec::new();
    for _ in 0..3 {
        clk.rising_edge().await?;
        rising.push(sim_if::current()?.get_sim_time("ns")?);
    }
    tb_assert!(rising == [7.0, 9.0, 11.0], "rising edges at {:?}", rising);
    Ok(Val::None)
}

#[test]
fn clock_toggles_every_nanosecond() {
    let tb = Testbench::new(dut(0, 0));
    let mut tests = test_list![sample_clock];
    tb.run(&mut tests).unwrap();
    assert_eq!(tests[0].outcome, Some(TestOutcome::Passed(String::new())));
    assert_eq!(tests[0].sim_time_ns, 11.0);
}

#[test]
fn count_to_16_logs_every_count() {
    let tb = Testbench::new(counter_dut());
    let mut tests = test_list![count_to_16];
    let (summary, logs) = with_logs(|| tb.run(&mut tests).unwrap());

    assert!(summary.all_passed());
    assert_eq!(tests[0].outcome, Some(TestOutcome::Passed("16".to_string())));
    // reset is released together with the first edge
    for n in 1..16 {
        assert!(logs.contains(&format!("Count: {}\n", n)), "missing Count: {}", n);
    }
    assert!(!logs.contains("Count: 0\n"));
    assert!(!logs.contains("Count: 16"));
}

#[test]
fn counter_matches_reference_under_random_reset() {
    let tb = Testbench::new(counter_dut());
    let mut tests = test_list![counter_random_reset];
    let summary = tb.run(&mut tests).unwrap();
    assert!(summary.all_passed(), "{:?}", tests[0].outcome);
}

async fn wait_forever(_dut: SimObject) -> RstbResult {
    Trigger::timer(10, "ms").await?;
    Ok(Val::None)
}

#[test]
fn time_limit_fails_the_test() {
    let sim = dut(0, 0);
    sim.set_time_limit(Some(5_000));
    let tb = Testbench::new(sim);
    let mut tests = test_list![wait_forever];
    tb.run(&mut tests).unwrap();
    assert_eq!(
        tests[0].outcome,
        Some(TestOutcome::Failed("simulation time limit reached".to_string()))
    );
}

async fn wait_undriven(dut: SimObject) -> RstbResult {
    dut.c("my_signal_1")?.edge().await?;
    Ok(Val::None)
}

#[test]
fn stalled_test_is_an_error() {
    let tb = Testbench::new(dut(0, 0));
    let mut tests = test_list![wait_undriven];
    let summary = tb.run(&mut tests).unwrap();
    assert_eq!(summary.errored, 1);
}

async fn fails_early(dut: SimObject) -> RstbResult {
    let clk = dut.c("clk")?;
    Task::fork(Clock::new(clk, 2, "ns").start());
    clk.rising_edge().await?;
    fail_test("gave up");
    // never resumed after the test ended
    clk.rising_edge().await?;
    pass_test("too late");
    Ok(Val::None)
}

async fn edges_after_failure(dut: SimObject) -> RstbResult {
    let clk = dut.c("clk")?;
    Task::fork(Clock::new(clk, 2, "ns").start());
    utils::clock_cycles(clk, 3).await?;
    Ok(Val::String("three edges".to_string()))
}

#[test]
fn fail_test_ends_test_and_next_test_runs_clean() {
    let tb = Testbench::new(dut(0, 0));
    let mut tests = test_list![fails_early, edges_after_failure];
    let summary = tb.run(&mut tests).unwrap();

    assert_eq!(tests[0].outcome, Some(TestOutcome::Failed("gave up".to_string())));
    assert_eq!(
        tests[1].outcome,
        Some(TestOutcome::Passed("three edges".to_string()))
    );
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 1);
}

async fn write_in_read_only(dut: SimObject) -> RstbResult {
    Trigger::read_only().await?;
    dut.c("my_signal_1")?.set_u64(1)?;
    Ok(Val::None)
}

#[test]
fn writes_during_read_only_are_rejected() {
    let tb = Testbench::new(dut(0, 0));
    let mut tests = test_list![write_in_read_only];
    tb.run(&mut tests).unwrap();
    assert_eq!(
        tests[0].outcome,
        Some(TestOutcome::Errored(
            "write to top.my_signal_1 during ReadOnly phase".to_string()
        ))
    );
}

async fn join_forked(_dut: SimObject) -> RstbResult {
    let child = Task::fork(async {
        Trigger::timer(3, "ns").await?;
        Ok::<_, TestError>(Val::Int(3))
    });
    let v = child.await?;
    tb_assert!(v == Val::Int(3), "child returned {:?}", v);
    Ok(v)
}

#[test]
fn forked_task_result_is_joinable() {
    let tb = Testbench::new(dut(0, 0));
    let mut tests = test_list![join_forked];
    tb.run(&mut tests).unwrap();
    assert_eq!(tests[0].outcome, Some(TestOutcome::Passed("3".to_string())));
    assert_eq!(tests[0].sim_time_ns, 3.0);
}

#[test]
fn configured_bench_writes_waveform_and_junit() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = TbConfig::default();
    config.output.vcd = Some(dir.path().join("waveform.vcd"));
    config.output.junit = Some(dir.path().join("results.xml"));
    config.signals.retain(|s| s.name != "my_signal_2");
    config.signals.push(SignalConfig {
        name: "my_signal_2".to_string(),
        width: 8,
        init: Some("0b00000001".to_string()),
    });

    let tb = Testbench::from_config(&config).unwrap();
    let mut tests = test_list![count_10, count_to_16];
    let (summary, _) = with_logs(|| tb.run(&mut tests).unwrap());
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 1);

    let vcd = std::fs::read_to_string(dir.path().join("waveform.vcd")).unwrap();
    assert!(vcd.contains("$var wire 1 ! clk $end"));
    assert!(vcd.contains("$var wire 8 # count $end"));
    assert!(vcd.contains("b00010000 #"));

    let xml = std::fs::read_to_string(dir.path().join("results.xml")).unwrap();
    assert!(xml.contains("count_to_16"));
    assert!(xml.contains("my_signal_2[0] is not 0!"));
}

#[test]
fn zero_width_signal_cannot_be_declared() {
    let sim = MemSim::new("top", -12);
    sim.add_signal("clk", LogicVec::zeros(1)).unwrap();
    sim.add_signal("my_signal_1", LogicVec::zeros(8)).unwrap();
    let err = sim.add_signal("my_signal_2", LogicVec::zeros(0)).unwrap_err();
    assert!(matches!(err, SimError::ZeroWidth(_)));

    let tb = Testbench::new(Rc::new(sim));
    let mut tests = test_list![count_10];
    tb.run(&mut tests).unwrap();
    assert_eq!(
        tests[0].outcome,
        Some(TestOutcome::Errored("signal not found: top.my_signal_2".to_string()))
    );
}

async fn clock_too_fast(dut: SimObject) -> RstbResult {
    let clk = dut.c("clk")?;
    Task::fork(Clock::new(clk, 1, "ns").start());
    clk.rising_edge().await?;
    Ok(Val::None)
}

#[test]
fn failing_clock_errors_the_test() {
    let tb = Testbench::new(dut(0, 0));
    let mut tests = test_list![clock_too_fast];
    tb.run(&mut tests).unwrap();
    assert_eq!(
        tests[0].outcome,
        Some(TestOutcome::Errored(
            "clock period 1ns is shorter than two time units".to_string()
        ))
    );
}

async fn clock_on_bus(dut: SimObject) -> RstbResult {
    Task::fork(Clock::new(dut.c("my_signal_1")?, 2, "ns").start());
    Trigger::timer(5, "ns").await?;
    Ok(Val::None)
}

#[test]
fn clock_write_errors_reach_the_test() {
    let tb = Testbench::new(dut(0, 0));
    let mut tests = test_list![clock_on_bus];
    let summary = tb.run(&mut tests).unwrap();
    assert_eq!(summary.errored, 1);
    assert_eq!(
        tests[0].outcome,
        Some(TestOutcome::Errored(
            "width mismatch on top.my_signal_1: expected 8 bits, got 1".to_string()
        ))
    );
    assert_eq!(tests[0].sim_time_ns, 0.0);
}

async fn read_only_order(_dut: SimObject) -> RstbResult {
    let order = Arc::new(Mutex::new(Vec::new()));
    let o = order.clone();
    let queued = Task::fork(async move {
        Trigger::read_only().await?;
        o.lock().unwrap().push("queued");
        Ok::<_, TestError>(Val::None)
    });
    // the forked task registers its ReadOnly wait first
    Trigger::read_write().await?;
    Trigger::read_only_first().await?;
    order.lock().unwrap().push("first");
    queued.await?;
    let order = order.lock().unwrap().clone();
    tb_assert!(order == ["first", "queued"], "order: {:?}", order);
    Ok(Val::None)
}

#[test]
fn read_only_first_jumps_the_queue() {
    let tb = Testbench::new(dut(0, 0));
    let mut tests = test_list![read_only_order];
    tb.run(&mut tests).unwrap();
    assert_eq!(tests[0].outcome, Some(TestOutcome::Passed(String::new())));
}

async fn phases_after_timer(dut: SimObject) -> RstbResult {
    let sig = dut.c("my_signal_1")?;
    Trigger::timer_rw(1, "ns").await?;
    sig.set_u64(5)?;
    Trigger::timer_ro(1, "ns").await?;
    tb_assert!(sig.set_u64(6).is_err(), "write accepted in ReadOnly phase");
    Ok(Val::Int(sig.u64()? as i64))
}

#[test]
fn timer_phase_helpers() {
    let tb = Testbench::new(dut(0, 0));
    let mut tests = test_list![phases_after_timer];
    tb.run(&mut tests).unwrap();
    assert_eq!(tests[0].outcome, Some(TestOutcome::Passed("5".to_string())));
    assert_eq!(tests[0].sim_time_ns, 2.0);
}

#[test]
fn with_junit_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("junit.xml");
    let tb = Testbench::new(dut(0, 1)).with_junit(path.clone());
    let mut tests = test_list![count_10];
    let (summary, logs) = with_logs(|| tb.run(&mut tests).unwrap());
    assert_eq!(summary.failed, 1);
    assert!(logs.contains("PASS=0 FAIL=1"));

    let xml = std::fs::read_to_string(&path).unwrap();
    assert!(xml.contains("count_10"));
    assert!(xml.contains("<failure"));
}

async fn drive_by_handle(dut: SimObject) -> RstbResult {
    let sig = dut.c("my_signal_1")?;
    sig.set_bin("0b0000_1x01")?;
    let v = sig.current_value()?;
    tb_assert!(v.to_string() == "00001x01", "got {}", v);
    tb_assert!(sig.u64().is_err(), "x bit read as an integer");
    sig.set_value(LogicVec::from_u64(3, 8))?;
    tb_assert!(sig.set_bin("101").is_err(), "3-bit write to 8-bit signal accepted");
    Ok(Val::Value(sig.current_value()?))
}

#[test]
fn signal_handle_reads_and_drives() {
    let tb = Testbench::new(dut(0, 0));
    let mut tests = test_list![drive_by_handle];
    tb.run(&mut tests).unwrap();
    assert_eq!(
        tests[0].outcome,
        Some(TestOutcome::Passed("00000011".to_string()))
    );
}
