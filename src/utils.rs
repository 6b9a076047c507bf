use crate::prelude::*;
use rand as rnd;

/// Waits for `n_cycles` rising edges of `signal`.
pub async fn clock_cycles(signal: SimObject, n_cycles: u32) -> RstbResult {
    for _ in 0..n_cycles {
        signal.rising_edge().await?;
    }
    Ok(Val::None)
}

#[inline]
pub fn rand() -> f32 {
    rnd::random::<f32>()
}

/// Uniform in `0..ceil`; always 0 for a `ceil` of 0.
#[inline]
pub fn rand_int(ceil: u32) -> u32 {
    if ceil == 0 {
        return 0;
    }
    rnd::random::<u32>() % ceil
}
