//! Behavioral models of small designs, run as tasks next to the testbench.

use crate::prelude::*;

/// Synchronous counter: on every rising edge of `clk`, `count` goes to 0 while
/// `reset` is high and increments (wrapping at its width) otherwise.
pub async fn counter(clk: SimObject, reset: SimObject, count: SimObject) -> RstbResult {
    loop {
        clk.rising_edge().await?;
        let next = if reset.u64()? == 1 {
            0
        } else {
            count.u64()?.wrapping_add(1)
        };
        count.set_u64(next)?;
    }
}
