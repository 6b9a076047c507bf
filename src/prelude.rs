pub use crate::clock::Clock;
pub use crate::error::{SimError, TestError};
pub use crate::executor::{JoinHandle, Task};
pub use crate::signal::{SignalHandle, SimObject};
pub use crate::trigger::Trigger;
pub use crate::utils;
pub use crate::value::{Logic, LogicVec, Val};
pub use crate::{fail_test, pass_test, tb_assert, RstbResult};
pub use futures::future::FutureExt;
