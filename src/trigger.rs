use intmap::IntMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use crate::error::SimError;
use crate::executor;
use crate::signal::SimObject;
use crate::sim_if::{self, SimCallback};

thread_local! {
    static TRIGGERS: RefCell<TriggerMaps> = RefCell::new(TriggerMaps::default());
}

struct TriggerMaps {
    // key is signal handle
    edges: IntMap<CallbackHandles>,
    // key is absolute callback time in steps
    timers: IntMap<CallbackHandles>,
    read_only: CallbackHandles,
    read_write: CallbackHandles,
}

impl Default for TriggerMaps {
    fn default() -> Self {
        Self {
            edges: IntMap::new(),
            timers: IntMap::new(),
            read_only: CallbackHandles::default(),
            read_write: CallbackHandles::default(),
        }
    }
}

#[derive(Default)]
struct CallbackHandles {
    handle: Option<usize>,
    callbacks: VecDeque<TrigShared>,
}

impl CallbackHandles {
    fn with(handle: usize, shared: TrigShared) -> Self {
        let mut callbacks = VecDeque::new();
        callbacks.push_back(shared);
        Self {
            handle: Some(handle),
            callbacks,
        }
    }
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

#[derive(Debug, Clone)]
struct TrigShared {
    waker: Waker,
    // lets react() tell rising from falling waiters without rescheduling the callback
    edge_kind: EdgeKind,
}

/// Drops every pending trigger and cancels its simulator callback.
pub(crate) fn cancel_all_triggers() {
    let maps = TRIGGERS.with(|t| std::mem::take(&mut *t.borrow_mut()));
    let Ok(sim) = sim_if::current() else {
        return;
    };
    let handles = maps
        .edges
        .values()
        .chain(maps.timers.values())
        .chain([&maps.read_only, &maps.read_write])
        .filter_map(|cb| cb.handle)
        .collect::<Vec<_>>();
    for handle in handles {
        if let Err(e) = sim.cancel_callback(handle) {
            tracing::warn!(handle, error = %e, "failed to cancel callback");
        }
    }
    // wakers are dropped here, outside the borrow
    drop(maps);
}

pub(crate) fn pending_count() -> usize {
    TRIGGERS.with(|t| {
        let t = t.borrow();
        t.edges.values().map(|c| c.callbacks.len()).sum::<usize>()
            + t.timers.values().map(|c| c.callbacks.len()).sum::<usize>()
            + t.read_only.callbacks.len()
            + t.read_write.callbacks.len()
    })
}

#[derive(Clone, Debug)]
enum Delay {
    Steps(u64),
    Time(u64, String),
}

#[derive(Clone, Debug)]
enum TrigKind {
    Edge(usize, EdgeKind),
    Timer(Delay),
    ReadWrite,
    ReadOnly,
}

/// Suspends the awaiting task until a simulator event.
#[derive(Clone, Debug)]
#[must_use = "triggers do nothing unless awaited"]
pub struct Trigger {
    kind: TrigKind,
    awaited: bool,
    // only honored for ReadOnly
    high_exec_prio: bool,
}

impl Trigger {
    fn of(kind: TrigKind) -> Self {
        Trigger {
            kind,
            awaited: false,
            high_exec_prio: false,
        }
    }

    pub fn timer(time: u64, unit: &str) -> Self {
        Trigger::of(TrigKind::Timer(Delay::Time(time, unit.to_string())))
    }
    pub fn timer_steps(steps: u64) -> Self {
        Trigger::of(TrigKind::Timer(Delay::Steps(steps)))
    }
    pub async fn timer_ro(time: u64, unit: &str) -> Result<(), SimError> {
        Trigger::timer(time, unit).await?;
        Trigger::read_only().await
    }
    pub async fn timer_rw(time: u64, unit: &str) -> Result<(), SimError> {
        Trigger::timer(time, unit).await?;
        Trigger::read_write().await
    }
    pub fn edge(signal: SimObject) -> Self {
        Trigger::of(TrigKind::Edge(signal.handle(), EdgeKind::Any))
    }
    pub fn rising_edge(signal: SimObject) -> Self {
        Trigger::of(TrigKind::Edge(signal.handle(), EdgeKind::Rising))
    }
    pub fn falling_edge(signal: SimObject) -> Self {
        Trigger::of(TrigKind::Edge(signal.handle(), EdgeKind::Falling))
    }
    pub fn read_write() -> Self {
        Trigger::of(TrigKind::ReadWrite)
    }
    pub fn read_only() -> Self {
        Trigger::of(TrigKind::ReadOnly)
    }
    /// ReadOnly trigger whose waiter runs before all other ReadOnly waiters.
    pub fn read_only_first() -> Self {
        Trigger {
            high_exec_prio: true,
            ..Trigger::of(TrigKind::ReadOnly)
        }
    }

    fn register(&self, waker: Waker) -> Result<(), SimError> {
        let sim = sim_if::current()?;
        let mut shared = TrigShared {
            waker,
            edge_kind: EdgeKind::Any,
        };
        TRIGGERS.with(|t| {
            let mut t = t.borrow_mut();
            match &self.kind {
                TrigKind::ReadWrite => {
                    if t.read_write.handle.is_none() {
                        t.read_write.handle = Some(sim.register_callback(SimCallback::ReadWrite)?);
                    }
                    t.read_write.callbacks.push_back(shared);
                }
                TrigKind::ReadOnly => {
                    if t.read_only.handle.is_none() {
                        t.read_only.handle = Some(sim.register_callback(SimCallback::ReadOnly)?);
                    }
                    match self.high_exec_prio {
                        false => t.read_only.callbacks.push_back(shared),
                        true => t.read_only.callbacks.push_front(shared),
                    }
                }
                TrigKind::Timer(delay) => {
                    let steps = match delay {
                        Delay::Steps(s) => *s,
                        Delay::Time(time, unit) => sim.get_sim_steps(*time as f64, unit)?,
                    };
                    // the simulator reports absolute time back
                    let abs_time = steps
                        .checked_add(sim.get_sim_time_steps())
                        .ok_or(SimError::TimeOverflow(steps))?;
                    if let Some(callbacks) = t.timers.get_mut(abs_time) {
                        callbacks.callbacks.push_back(shared);
                    } else {
                        let handle = sim.register_callback(SimCallback::Time(steps))?;
                        t.timers.insert(abs_time, CallbackHandles::with(handle, shared));
                    }
                }
                TrigKind::Edge(sig_hdl, edge_kind) => {
                    shared.edge_kind = *edge_kind;
                    if let Some(callbacks) = t.edges.get_mut(*sig_hdl as u64) {
                        callbacks.callbacks.push_back(shared);
                    } else {
                        let handle = sim.register_callback(SimCallback::Edge(*sig_hdl))?;
                        t.edges.insert(*sig_hdl as u64, CallbackHandles::with(handle, shared));
                    }
                }
            }
            Ok(())
        })
    }
}

impl Future for Trigger {
    type Output = Result<(), SimError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A trigger is registered on the first poll; the next poll comes from its waker.
        if self.awaited {
            Poll::Ready(Ok(()))
        } else {
            self.awaited = true;
            match self.register(cx.waker().clone()) {
                Ok(()) => Poll::Pending,
                Err(e) => Poll::Ready(Err(e)),
            }
        }
    }
}

/// Entry point for simulator callbacks: wakes the waiting tasks and runs them.
pub fn react(cb: SimCallback, edge: Option<EdgeKind>) {
    let mut cancel = None;
    let vec_wake = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        match cb {
            SimCallback::ReadWrite => {
                t.read_write.handle = None;
                Some(std::mem::take(&mut t.read_write.callbacks))
            }
            SimCallback::ReadOnly => {
                t.read_only.handle = None;
                Some(std::mem::take(&mut t.read_only.callbacks))
            }
            SimCallback::Time(abs_time) => t.timers.remove(abs_time).map(|c| c.callbacks),
            SimCallback::Edge(sig_hdl) => {
                let mut callbacks = t.edges.remove(sig_hdl as u64)?;
                let edge = edge.unwrap_or(EdgeKind::Any);
                let (wake, resched): (VecDeque<_>, VecDeque<_>) = callbacks
                    .callbacks
                    .drain(..)
                    .partition(|trig| edge_matches(trig.edge_kind, edge));
                if resched.is_empty() {
                    // no waiters remain
                    cancel = callbacks.handle;
                } else {
                    callbacks.callbacks = resched;
                    t.edges.insert(sig_hdl as u64, callbacks);
                }
                Some(wake)
            }
        }
    });

    if let Some(handle) = cancel {
        if let Ok(sim) = sim_if::current() {
            if let Err(e) = sim.cancel_callback(handle) {
                tracing::warn!(handle, error = %e, "failed to cancel edge callback");
            }
        }
    }

    match vec_wake {
        Some(vec_wake) => {
            for shared in vec_wake {
                shared.waker.wake();
            }
            executor::run_once();
        }
        None => tracing::warn!(?cb, "did not expect callback"),
    }
}

fn edge_matches(waiting: EdgeKind, happened: EdgeKind) -> bool {
    waiting == EdgeKind::Any || waiting == happened
}
