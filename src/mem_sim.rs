//! In-process event-driven simulator.
//!
//! [`MemSim`] holds the signal values of a flat design and a queue of pending
//! callbacks. Behavior comes from tasks running on the executor, typically a
//! testbench plus behavioral models of the design. Each time step is processed
//! as: value-change (edge) callbacks until quiet, the ReadWrite callback, the
//! ReadOnly callback, repeated until nothing is left; then time advances to the
//! next timer.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::Write;

use crate::error::SimError;
use crate::executor;
use crate::sim_if::{ObjectKind, SimCallback, SimIf};
use crate::time;
use crate::trigger::{self, EdgeKind};
use crate::value::{Logic, LogicVec};
use crate::vcd::VcdWriter;

const ROOT_HANDLE: usize = 0;

/// Why [`MemSim::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// The stop condition held.
    Stopped,
    /// No callbacks are left to run.
    Exhausted,
    /// The next event lies beyond the time limit.
    TimeLimit,
}

enum Event {
    Edge(usize, EdgeKind),
    ReadWrite,
    ReadOnly,
    Timer(u64),
    TimeLimit,
    Idle,
}

struct SignalEntry {
    name: String,
    value: LogicVec,
}

struct Inner {
    top: String,
    precision: i8,
    time: u64,
    time_limit: Option<u64>,
    // handle - 1 indexes this
    signals: Vec<SignalEntry>,
    names: HashMap<String, usize>,
    next_cb: usize,
    // registered callbacks; Time holds the absolute time
    callbacks: HashMap<usize, SimCallback>,
    timers: BTreeMap<u64, VecDeque<usize>>,
    // signal handle -> callback handle
    edge_watch: HashMap<usize, usize>,
    pending_edges: VecDeque<(usize, EdgeKind)>,
    read_write: Option<usize>,
    read_only: Option<usize>,
    in_read_only: bool,
    vcd: Option<VcdWriter<Box<dyn Write>>>,
}

pub struct MemSim {
    inner: RefCell<Inner>,
}

impl MemSim {
    /// `precision` is the power of ten of one step, e.g. -12 for 1 ps.
    pub fn new(top: &str, precision: i8) -> Self {
        Self {
            inner: RefCell::new(Inner {
                top: top.to_string(),
                precision,
                time: 0,
                time_limit: None,
                signals: Vec::new(),
                names: HashMap::new(),
                next_cb: 1,
                callbacks: HashMap::new(),
                timers: BTreeMap::new(),
                edge_watch: HashMap::new(),
                pending_edges: VecDeque::new(),
                read_write: None,
                read_only: None,
                in_read_only: false,
                vcd: None,
            }),
        }
    }

    /// Declares a signal `<top>.<name>` with the width of `init`. Returns its handle.
    pub fn add_signal(&self, name: &str, init: LogicVec) -> Result<usize, SimError> {
        let mut inner = self.inner.borrow_mut();
        if inner.vcd.is_some() {
            return Err(SimError::WaveformStarted(name.to_string()));
        }
        if inner.names.contains_key(name) {
            return Err(SimError::DuplicateSignal(name.to_string()));
        }
        if init.width() == 0 {
            return Err(SimError::ZeroWidth(name.to_string()));
        }
        inner.signals.push(SignalEntry {
            name: name.to_string(),
            value: init,
        });
        let handle = inner.signals.len();
        inner.names.insert(name.to_string(), handle);
        tracing::debug!(name, handle, "declared signal");
        Ok(handle)
    }

    /// Stops [`MemSim::run`] before any event later than `steps`.
    pub fn set_time_limit(&self, steps: Option<u64>) {
        self.inner.borrow_mut().time_limit = steps;
    }

    /// Records every later value change. Signals can't be added afterwards.
    pub fn enable_vcd(&self, writer: Box<dyn Write>) -> Result<(), SimError> {
        let mut inner = self.inner.borrow_mut();
        let timescale = format!("1{}", time::scale_time(inner.precision)?.replace("sec", "s"));
        let mut vcd = VcdWriter::new(writer, &timescale);
        let signals = inner
            .signals
            .iter()
            .enumerate()
            .map(|(i, s)| (i + 1, s.name.as_str(), &s.value))
            .collect::<Vec<_>>();
        vcd.begin(&inner.top, &signals)?;
        inner.vcd = Some(vcd);
        Ok(())
    }

    pub fn finish_vcd(&self) -> Result<(), SimError> {
        if let Some(mut vcd) = self.inner.borrow_mut().vcd.take() {
            vcd.finish()?;
        }
        Ok(())
    }

    /// Drives the scheduling loop until `stop()` holds, nothing is left to do,
    /// or the time limit is reached.
    pub fn run(&self, mut stop: impl FnMut() -> bool) -> Result<RunStatus, SimError> {
        executor::run_once();
        loop {
            if stop() {
                return Ok(RunStatus::Stopped);
            }
            // the borrow must end before react() runs tasks that call back into us
            let event = self.next_event();
            match event {
                Event::Edge(sig, kind) => trigger::react(SimCallback::Edge(sig), Some(kind)),
                Event::ReadWrite => trigger::react(SimCallback::ReadWrite, None),
                Event::ReadOnly => {
                    self.inner.borrow_mut().in_read_only = true;
                    trigger::react(SimCallback::ReadOnly, None);
                    self.inner.borrow_mut().in_read_only = false;
                }
                Event::Timer(abs_time) => trigger::react(SimCallback::Time(abs_time), None),
                Event::TimeLimit => return Ok(RunStatus::TimeLimit),
                Event::Idle => return Ok(RunStatus::Exhausted),
            }
        }
    }

    fn next_event(&self) -> Event {
        let mut inner = self.inner.borrow_mut();
        while let Some((sig, kind)) = inner.pending_edges.pop_front() {
            // value-change callbacks stay registered until cancelled
            if inner.edge_watch.contains_key(&sig) {
                return Event::Edge(sig, kind);
            }
        }
        if let Some(cb) = inner.read_write.take() {
            inner.callbacks.remove(&cb);
            return Event::ReadWrite;
        }
        if let Some(cb) = inner.read_only.take() {
            inner.callbacks.remove(&cb);
            return Event::ReadOnly;
        }
        let Some((&abs_time, _)) = inner.timers.first_key_value() else {
            return Event::Idle;
        };
        if inner.time_limit.is_some_and(|limit| abs_time > limit) {
            return Event::TimeLimit;
        }
        let cb = match inner.timers.get_mut(&abs_time) {
            Some(queue) => queue.pop_front(),
            None => None,
        };
        if inner.timers.get(&abs_time).is_some_and(|q| q.is_empty()) {
            inner.timers.remove(&abs_time);
        }
        if let Some(cb) = cb {
            inner.callbacks.remove(&cb);
        }
        inner.time = abs_time;
        Event::Timer(abs_time)
    }

    fn entry(inner: &Inner, handle: usize) -> Result<&SignalEntry, SimError> {
        handle
            .checked_sub(1)
            .and_then(|i| inner.signals.get(i))
            .ok_or(SimError::InvalidHandle(handle))
    }
}

fn edge_kind(old: &LogicVec, new: &LogicVec) -> EdgeKind {
    if new.width() != 1 {
        return EdgeKind::Any;
    }
    match (old[0], new[0]) {
        (o, Logic::One) if o != Logic::One => EdgeKind::Rising,
        (o, Logic::Zero) if o != Logic::Zero => EdgeKind::Falling,
        _ => EdgeKind::Any,
    }
}

impl SimIf for MemSim {
    fn get_value(&self, handle: usize) -> Result<LogicVec, SimError> {
        let inner = self.inner.borrow();
        if handle == ROOT_HANDLE {
            return Err(SimError::NoValue(inner.top.clone()));
        }
        Ok(Self::entry(&inner, handle)?.value.clone())
    }

    fn set_value(&self, handle: usize, value: LogicVec) -> Result<(), SimError> {
        let mut inner = self.inner.borrow_mut();
        if handle == ROOT_HANDLE {
            return Err(SimError::NoValue(inner.top.clone()));
        }
        let entry = Self::entry(&inner, handle)?;
        let full_name = || format!("{}.{}", inner.top, entry.name);
        if inner.in_read_only {
            return Err(SimError::ReadOnlyWrite(full_name()));
        }
        if entry.value.width() != value.width() {
            return Err(SimError::WidthMismatch {
                name: full_name(),
                expected: entry.value.width(),
                got: value.width(),
            });
        }
        if entry.value == value {
            return Ok(());
        }
        let kind = edge_kind(&entry.value, &value);
        let now = inner.time;
        if let Some(vcd) = inner.vcd.as_mut() {
            vcd.change(now, handle, &value)?;
        }
        if inner.edge_watch.contains_key(&handle) {
            inner.pending_edges.push_back((handle, kind));
        }
        inner.signals[handle - 1].value = value;
        Ok(())
    }

    fn get_handle_by_name(&self, name: &str) -> Result<usize, SimError> {
        let inner = self.inner.borrow();
        if name == inner.top {
            return Ok(ROOT_HANDLE);
        }
        name.strip_prefix(inner.top.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(|short| inner.names.get(short).copied())
            .ok_or_else(|| SimError::SignalNotFound(name.to_string()))
    }

    fn get_full_name(&self, handle: usize) -> Result<String, SimError> {
        let inner = self.inner.borrow();
        if handle == ROOT_HANDLE {
            return Ok(inner.top.clone());
        }
        Ok(format!("{}.{}", inner.top, Self::entry(&inner, handle)?.name))
    }

    fn get_kind(&self, handle: usize) -> Result<ObjectKind, SimError> {
        let inner = self.inner.borrow();
        if handle == ROOT_HANDLE {
            return Ok(ObjectKind::Hier);
        }
        Ok(ObjectKind::Vector(Self::entry(&inner, handle)?.value.width()))
    }

    fn get_root_handle(&self) -> usize {
        ROOT_HANDLE
    }

    fn get_sim_time_steps(&self) -> u64 {
        self.inner.borrow().time
    }

    fn get_sim_precision(&self) -> i8 {
        self.inner.borrow().precision
    }

    fn register_callback(&self, cb: SimCallback) -> Result<usize, SimError> {
        let mut inner = self.inner.borrow_mut();
        let handle = inner.next_cb;
        let registered = match cb {
            SimCallback::Time(delay) => {
                let abs_time = inner
                    .time
                    .checked_add(delay)
                    .ok_or(SimError::TimeOverflow(delay))?;
                inner.timers.entry(abs_time).or_default().push_back(handle);
                SimCallback::Time(abs_time)
            }
            SimCallback::Edge(sig) => {
                Self::entry(&inner, sig)?;
                inner.edge_watch.insert(sig, handle);
                cb
            }
            SimCallback::ReadWrite => {
                inner.read_write = Some(handle);
                cb
            }
            SimCallback::ReadOnly => {
                inner.read_only = Some(handle);
                cb
            }
        };
        inner.next_cb += 1;
        inner.callbacks.insert(handle, registered);
        Ok(handle)
    }

    fn cancel_callback(&self, cb_hdl: usize) -> Result<(), SimError> {
        let mut inner = self.inner.borrow_mut();
        let cb = inner
            .callbacks
            .remove(&cb_hdl)
            .ok_or(SimError::UnknownCallback(cb_hdl))?;
        match cb {
            SimCallback::Time(abs_time) => {
                if let Some(queue) = inner.timers.get_mut(&abs_time) {
                    queue.retain(|h| *h != cb_hdl);
                    if queue.is_empty() {
                        inner.timers.remove(&abs_time);
                    }
                }
            }
            SimCallback::Edge(sig) => {
                if inner.edge_watch.get(&sig) == Some(&cb_hdl) {
                    inner.edge_watch.remove(&sig);
                }
            }
            SimCallback::ReadWrite => {
                if inner.read_write == Some(cb_hdl) {
                    inner.read_write = None;
                }
            }
            SimCallback::ReadOnly => {
                if inner.read_only == Some(cb_hdl) {
                    inner.read_only = None;
                }
            }
        }
        Ok(())
    }
}
