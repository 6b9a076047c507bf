use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::SimError;
use crate::sim_if::{self, ObjectKind};
use crate::trigger::Trigger;
use crate::value::LogicVec;

thread_local! {
    // full name -> object, filled on first lookup
    static SIG_MAP_NAME: RefCell<HashMap<String, SimObject>> = RefCell::new(HashMap::new());
}

pub(crate) fn clear_objects() {
    SIG_MAP_NAME.with(|m| m.borrow_mut().clear());
}

/// Anything whose value can be read and driven.
pub trait SignalHandle {
    fn current_value(&self) -> Result<LogicVec, SimError>;
    fn set_value(&self, value: LogicVec) -> Result<(), SimError>;
}

/// Handle to a signal or scope of the design under test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimObject {
    pub(crate) handle: usize,
    pub(crate) kind: ObjectKind,
}

impl SimObject {
    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn name(&self) -> Result<String, SimError> {
        sim_if::current()?.get_full_name(self.handle)
    }

    pub fn width(&self) -> Result<u32, SimError> {
        match self.kind {
            ObjectKind::Vector(width) => Ok(width),
            ObjectKind::Hier => Err(SimError::NoValue(self.name()?)),
        }
    }

    pub fn get_root() -> Result<Self, SimError> {
        let sim = sim_if::current()?;
        let handle = sim.get_root_handle();
        Ok(SimObject {
            handle,
            kind: sim.get_kind(handle)?,
        })
    }

    pub fn from_name(full_name: &str) -> Result<Self, SimError> {
        if let Some(obj) = SIG_MAP_NAME.with(|m| m.borrow().get(full_name).copied()) {
            return Ok(obj);
        }
        let sim = sim_if::current()?;
        let handle = sim.get_handle_by_name(full_name)?;
        let obj = SimObject {
            handle,
            kind: sim.get_kind(handle)?,
        };
        SIG_MAP_NAME.with(|m| m.borrow_mut().insert(full_name.to_string(), obj));
        Ok(obj)
    }

    pub fn get_child(&self, name: &str) -> Result<Self, SimError> {
        let mut child_name = self.name()?;
        child_name.push('.');
        child_name.push_str(name);
        SimObject::from_name(&child_name)
    }

    /// Short for [`SimObject::get_child`].
    pub fn c(&self, name: &str) -> Result<Self, SimError> {
        self.get_child(name)
    }

    /// Logs `msg` through the simulator, tagged with the simulation time.
    pub fn log(&self, msg: &str) -> Result<(), SimError> {
        sim_if::current()?.log(msg);
        Ok(())
    }

    pub fn value(&self) -> Result<LogicVec, SimError> {
        sim_if::current()?.get_value(self.handle)
    }

    pub fn u64(&self) -> Result<u64, SimError> {
        let value = self.value()?;
        value
            .to_u64()
            .ok_or_else(|| SimError::Unresolvable(value.to_string()))
    }

    pub fn set(&self, value: LogicVec) -> Result<(), SimError> {
        sim_if::current()?.set_value(self.handle, value)
    }

    pub fn set_u64(&self, value: u64) -> Result<(), SimError> {
        self.set(LogicVec::from_u64(value, self.width()?))
    }

    /// Accepts `0b` prefixes and `_` separators; the digit count must match the width.
    pub fn set_bin(&self, value: &str) -> Result<(), SimError> {
        self.set(LogicVec::from_bin(value)?)
    }

    // edge triggers for this signal
    pub fn rising_edge(self) -> Trigger {
        Trigger::rising_edge(self)
    }
    pub async fn rising_edge_ro(self) -> Result<(), SimError> {
        self.rising_edge().await?;
        Trigger::read_only().await
    }
    pub fn falling_edge(self) -> Trigger {
        Trigger::falling_edge(self)
    }
    pub fn edge(self) -> Trigger {
        Trigger::edge(self)
    }
}

impl SignalHandle for SimObject {
    fn current_value(&self) -> Result<LogicVec, SimError> {
        self.value()
    }

    fn set_value(&self, value: LogicVec) -> Result<(), SimError> {
        self.set(value)
    }
}
