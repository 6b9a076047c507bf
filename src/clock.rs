use crate::error::SimError;
use crate::signal::SimObject;
use crate::trigger::Trigger;
use crate::value::LogicVec;
use crate::RstbResult;

/// Drives a 1-bit signal with a free-running clock.
#[derive(Clone, Debug)]
pub struct Clock {
    signal: SimObject,
    period: u64,
    unit: String,
}

impl Clock {
    /// `period` is the full period in `unit`.
    pub fn new(signal: SimObject, period: u64, unit: &str) -> Self {
        Self {
            signal,
            period,
            unit: unit.to_string(),
        }
    }

    /// Time spent high and low per period. An odd period gives the extra step to the low phase.
    pub fn phases(&self) -> (u64, u64) {
        let high_t = self.period / 2;
        (high_t, self.period - high_t)
    }

    /// Toggles the signal forever, starting low. Fork it with [`crate::executor::Task::fork`].
    pub async fn start(self) -> RstbResult {
        let (high_t, low_t) = self.phases();
        if self.period % 2 != 0 {
            tracing::warn!(
                "Clock period {period}{unit} not dividable by 2. High time will be {high}{unit}; low time will be {low}{unit}.",
                period = self.period,
                unit = self.unit,
                high = high_t,
                low = low_t
            );
        }
        if high_t == 0 {
            return Err(SimError::ClockPeriod(format!("{}{}", self.period, self.unit)).into());
        }
        let low = LogicVec::from_u64(0, 1);
        let high = LogicVec::from_u64(1, 1);
        loop {
            self.signal.set(low.clone())?;
            Trigger::timer(low_t, &self.unit).await?;
            self.signal.set(high.clone())?;
            Trigger::timer(high_t, &self.unit).await?;
        }
    }
}
