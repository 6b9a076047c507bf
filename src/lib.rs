//! Write HDL testbenches in Rust.
//!
//! Tests are async functions taking the root [`signal::SimObject`] of the design.
//! They fork background tasks ([`executor::Task::fork`]), wait on simulator events
//! ([`trigger::Trigger`]) and read or drive signals. [`testbench::Testbench`] runs
//! them one after another against an installed simulator ([`mem_sim::MemSim`]).

pub mod bench;
pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
mod junit;
pub mod mem_sim;
pub mod models;
pub mod prelude;
mod report;
pub mod signal;
pub mod sim_if;
pub mod testbench;
pub mod time;
pub mod trigger;
pub mod utils;
pub mod value;
pub mod vcd;

use std::cell::RefCell;
use std::sync::Arc;

use error::TestError;
use executor::Task;
use test::TestOutcome;
use value::Val;

pub type RstbResult = Result<Val, TestError>;

thread_local! {
    static CURRENT_TEST: RefCell<Option<Arc<Task>>> = const { RefCell::new(None) };
    static TEST_OUTCOME: RefCell<Option<TestOutcome>> = const { RefCell::new(None) };
}

/// Passes the running test, unless it already ended.
pub fn pass_test(msg: &str) {
    finish_test(TestOutcome::Passed(msg.to_string()));
}

/// Fails the running test, unless it already ended.
pub fn fail_test(msg: &str) {
    finish_test(TestOutcome::Failed(msg.to_string()));
}

pub(crate) fn begin_test(task: Arc<Task>) {
    TEST_OUTCOME.with(|o| o.borrow_mut().take());
    CURRENT_TEST.with(|c| c.borrow_mut().replace(task));
}

pub(crate) fn test_running() -> bool {
    CURRENT_TEST.with(|c| c.borrow().is_some())
}

pub(crate) fn take_outcome() -> Option<TestOutcome> {
    TEST_OUTCOME.with(|o| o.borrow_mut().take())
}

/// The first outcome reported for a test wins; everything the test started is torn down.
pub(crate) fn finish_test(outcome: TestOutcome) {
    let Some(task) = CURRENT_TEST.with(|c| c.borrow_mut().take()) else {
        return;
    };
    TEST_OUTCOME.with(|o| o.borrow_mut().replace(outcome));
    tear_down_test(task);
}

fn tear_down_test(test: Arc<Task>) {
    test.cancel();
    tear_down_tasks();
}

/// Cancels all triggers and drops all runnable tasks. Dropping a task can wake
/// others, so this repeats until nothing is left.
pub(crate) fn tear_down_tasks() {
    loop {
        trigger::cancel_all_triggers();
        executor::clear_ready_queue();
        if executor::ready_len() == 0 && trigger::pending_count() == 0 {
            break;
        }
    }
}
