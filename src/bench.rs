//! Testbench routines run by the `tbkit` binary.

use crate::models;
use crate::prelude::*;

pub async fn count_10(dut: SimObject) -> RstbResult {
    Task::fork(Clock::new(dut.c("clk")?, 2, "ns").start());

    // Trigger::timer(5, "ns").await?;  // wait a bit
    // dut.c("clk")?.falling_edge().await?;  // wait for falling edge/"negedge"

    dut.log(&format!("my_signal_1 is {}", dut.c("my_signal_1")?.current_value()?))?;
    tb_assert!(
        dut.c("my_signal_2")?.current_value()?[0] == Logic::Zero,
        "my_signal_2[0] is not 0!"
    );
    Ok(Val::None)
}

/// Holds reset, releases it for the first rising edge, then clocks the
/// counter until it passes 0xF.
pub async fn count_to_16(dut: SimObject) -> RstbResult {
    let clk = dut.c("clk")?;
    let reset = dut.c("reset")?;
    let count = dut.c("count")?;
    Task::fork(models::counter(clk, reset, count));

    clk.set_u64(0)?;
    reset.set_u64(1)?;
    Trigger::timer(1, "ns").await?;
    reset.set_u64(0)?;
    Task::fork(Clock::new(clk, 2, "ns").start());
    clk.rising_edge_ro().await?;

    while count.u64()? <= 0xF {
        tracing::info!("Count: {}", count.u64()?);
        clk.rising_edge_ro().await?;
    }
    Ok(Val::Int(count.u64()? as i64))
}

/// Drives reset randomly and checks the counter against a reference after every edge.
pub async fn counter_random_reset(dut: SimObject) -> RstbResult {
    let clk = dut.c("clk")?;
    let reset = dut.c("reset")?;
    let count = dut.c("count")?;
    let width = count.width()?;
    Task::fork(models::counter(clk, reset, count));
    Task::fork(Clock::new(clk, 10, "ns").start());

    reset.set_u64(1)?;
    clk.rising_edge_ro().await?;
    for _ in 0..50 {
        clk.falling_edge().await?;
        let r = utils::rand_int(4) == 0;
        reset.set_u64(r as u64)?;
        let before = count.u64()?;
        clk.rising_edge_ro().await?;
        let expected = if r { 0 } else { (before + 1) % (1 << width) };
        let got = count.u64()?;
        tb_assert!(got == expected, "count is {}, expected {}", got, expected);
    }
    Ok(Val::None)
}
