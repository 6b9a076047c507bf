use std::cell::RefCell;
use std::rc::Rc;

use crate::error::SimError;
use crate::time;
use crate::value::LogicVec;

thread_local! {
    static SIM_IF: RefCell<Option<Rc<dyn SimIf>>> = const { RefCell::new(None) };
}

/// Makes `sim` the simulator all signals, triggers and tests on this thread talk to.
pub fn install(sim: Rc<dyn SimIf>) {
    SIM_IF.with(|s| s.borrow_mut().replace(sim));
}

pub fn uninstall() {
    SIM_IF.with(|s| s.borrow_mut().take());
}

/// The simulator installed on this thread.
pub fn current() -> Result<Rc<dyn SimIf>, SimError> {
    SIM_IF.with(|s| s.borrow().clone().ok_or(SimError::NoSimulator))
}

/// Callback reasons. `Time` carries the delay when registering and the absolute
/// time when the simulator reports it back.
#[derive(Debug, Hash, Clone, Copy, Eq, PartialEq)]
pub enum SimCallback {
    Time(u64),
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// Bit vector of the given width.
    Vector(u32),
    Hier,
}

pub trait SimIf {
    fn get_value(&self, handle: usize) -> Result<LogicVec, SimError>;
    fn set_value(&self, handle: usize, value: LogicVec) -> Result<(), SimError>;
    fn get_handle_by_name(&self, name: &str) -> Result<usize, SimError>;
    fn get_full_name(&self, handle: usize) -> Result<String, SimError>;
    fn get_kind(&self, handle: usize) -> Result<ObjectKind, SimError>;
    fn get_root_handle(&self) -> usize;
    fn get_sim_time_steps(&self) -> u64;
    /// Power of ten of one simulator step.
    fn get_sim_precision(&self) -> i8;
    fn register_callback(&self, cb: SimCallback) -> Result<usize, SimError>;
    fn cancel_callback(&self, cb_hdl: usize) -> Result<(), SimError>;

    fn log(&self, msg: &str) {
        tracing::info!(sim_steps = self.get_sim_time_steps(), "{}", msg);
    }
    fn get_sim_time(&self, unit: &str) -> Result<f64, SimError> {
        // does not preserve precision
        time::from_steps(self.get_sim_time_steps(), unit, self.get_sim_precision())
    }
    fn get_sim_steps(&self, time: f64, unit: &str) -> Result<u64, SimError> {
        time::to_steps(time, unit, self.get_sim_precision())
    }
}
