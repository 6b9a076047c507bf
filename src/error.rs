//! Error types shared by the simulator interface, the executor and tests.

use std::io;

/// Errors raised by the simulator backend or by the framework plumbing around it.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// No simulator has been installed on the current thread.
    #[error("no simulator installed")]
    NoSimulator,

    /// A signal name could not be resolved.
    #[error("signal not found: {0}")]
    SignalNotFound(String),

    /// A handle does not refer to any known object.
    #[error("invalid handle: {0}")]
    InvalidHandle(usize),

    /// A signal was declared twice.
    #[error("signal already declared: {0}")]
    DuplicateSignal(String),

    /// A value does not have the width of the signal it is written to.
    #[error("width mismatch on {name}: expected {expected} bits, got {got}")]
    WidthMismatch {
        /// Full name of the signal.
        name: String,
        /// Declared width of the signal.
        expected: u32,
        /// Width of the rejected value.
        got: u32,
    },

    /// A signal was declared without any bits.
    #[error("signal {0} has width 0")]
    ZeroWidth(String),

    /// A delay would move simulation time past `u64::MAX` steps.
    #[error("delay of {0} steps overflows simulation time")]
    TimeOverflow(u64),

    /// The object has no value (e.g. a scope).
    #[error("{0} has no value")]
    NoValue(String),

    /// A binary string contained characters other than `0 1 x z _`.
    #[error("invalid binary value: {0}")]
    InvalidBinary(String),

    /// A value with x/z bits was read as an integer.
    #[error("value {0} is not resolvable to an integer")]
    Unresolvable(String),

    /// A time unit string was not one of `fs ps ns us ms sec`.
    #[error("unknown time unit: {0}")]
    UnknownTimeUnit(String),

    /// A time cannot be expressed in whole simulator steps.
    #[error("can't convert {time} {unit} to sim steps without rounding (precision: {precision})")]
    TimeRounding {
        /// Requested time.
        time: f64,
        /// Requested unit.
        unit: String,
        /// Simulator precision as a unit string.
        precision: String,
    },

    /// A clock period too short to have a high and a low phase.
    #[error("clock period {0} is shorter than two time units")]
    ClockPeriod(String),

    /// A signal was written during the ReadOnly phase.
    #[error("write to {0} during ReadOnly phase")]
    ReadOnlyWrite(String),

    /// A callback handle is not registered.
    #[error("unknown callback handle: {0}")]
    UnknownCallback(usize),

    /// Signals can't be declared after waveform recording started.
    #[error("can't declare {0}: waveform recording already started")]
    WaveformStarted(String),

    /// A test report could not be written.
    #[error("report error: {0}")]
    Report(String),

    /// An I/O error occurred while writing waveform or report output.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Why a test (or a task) did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// A check inside the test failed.
    #[error("{message}")]
    Assertion {
        /// Message given at the check site.
        message: String,
    },

    /// The simulator or framework reported an error the test didn't handle.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// The awaited task was dropped before it completed.
    #[error("task cancelled")]
    Cancelled,
}

impl TestError {
    /// Builds an assertion failure.
    pub fn assertion(message: impl Into<String>) -> Self {
        TestError::Assertion {
            message: message.into(),
        }
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, TestError::Assertion { .. })
    }
}

/// Fails the enclosing test with an assertion error when the condition doesn't hold.
///
/// ```ignore
/// tb_assert!(value[0] == Logic::Zero, "my_signal_2[0] is not 0!");
/// ```
#[macro_export]
macro_rules! tb_assert {
    ($cond: expr, $($msg: tt)+) => {
        if !$cond {
            return Err($crate::error::TestError::assertion(format!($($msg)+)));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_not_found_display() {
        let e = SimError::SignalNotFound("top.foo".into());
        assert_eq!(e.to_string(), "signal not found: top.foo");
    }

    #[test]
    fn width_mismatch_display() {
        let e = SimError::WidthMismatch {
            name: "top.bus".into(),
            expected: 8,
            got: 4,
        };
        assert_eq!(
            e.to_string(),
            "width mismatch on top.bus: expected 8 bits, got 4"
        );
    }

    #[test]
    fn assertion_displays_bare_message() {
        let e = TestError::assertion("my_signal_2[0] is not 0!");
        assert_eq!(e.to_string(), "my_signal_2[0] is not 0!");
        assert!(e.is_assertion());
    }

    #[test]
    fn sim_error_is_transparent() {
        let e: TestError = SimError::NoSimulator.into();
        assert_eq!(e.to_string(), "no simulator installed");
        assert!(!e.is_assertion());
    }

    fn check(v: u32) -> Result<(), TestError> {
        tb_assert!(v == 0, "v is {}", v);
        Ok(())
    }

    #[test]
    fn tb_assert_returns_assertion() {
        assert!(check(0).is_ok());
        let err = check(3).unwrap_err();
        assert_eq!(err.to_string(), "v is 3");
    }
}
