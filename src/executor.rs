use futures::{future::{BoxFuture, FutureExt}, task::{waker_ref, ArcWake, Context, Poll}};
use futures_channel::oneshot;
use queues::{IsQueue, Queue};
use std::{cell::RefCell, future::Future, pin::Pin, sync::{Arc, Mutex}};

use crate::{error::TestError, test::TestOutcome, RstbResult};

thread_local! {
    static READY_QUEUE: RefCell<Queue<Arc<Task>>> = RefCell::new(Queue::new());
}

pub fn schedule_task(task: Arc<Task>) {
    READY_QUEUE.with(|q| {
        let _ = q.borrow_mut().add(task);
    });
}

fn next_task() -> Option<Arc<Task>> {
    READY_QUEUE.with(|q| q.borrow_mut().remove().ok())
}

pub(crate) fn clear_ready_queue() {
    // dropped outside the borrow, a task's drop may wake others
    let old = READY_QUEUE.with(|q| std::mem::replace(&mut *q.borrow_mut(), Queue::new()));
    drop(old);
}

pub(crate) fn ready_len() -> usize {
    READY_QUEUE.with(|q| q.borrow().size())
}

/// Polls tasks until the ready queue is empty.
#[inline]
pub fn run_once() {
    while let Some(task) = next_task() {
        process_task(task);
    }
}

#[inline]
fn process_task(task: Arc<Task>) {
    if task.is_cancelled() {
        // dropped once all references disappear
        return;
    }

    let mut fut_slot = match task.future.lock() {
        Ok(slot) => slot,
        Err(_) => return,
    };
    let Some(mut fut) = fut_slot.take() else {
        // woken again after completion
        return;
    };
    let waker = waker_ref(&task);
    let context = &mut Context::from_waker(&waker);
    match fut.as_mut().poll(context) {
        Poll::Pending => {
            *fut_slot = Some(fut);
        }
        Poll::Ready(result) => {
            drop(fut_slot);
            *task.state.lock().unwrap_or_else(|e| e.into_inner()) = TaskState::Done;
            tracing::trace!(task = %task.name, "task complete");
            let tx = task.join_tx.lock().unwrap_or_else(|e| e.into_inner()).take();
            if let Some(tx) = tx {
                // nobody joins a detached task, so its error ends the test
                if let Err(Err(e)) = tx.send(result) {
                    tracing::error!(task = %task.name, error = %e, "forked task failed");
                    crate::finish_test(TestOutcome::from_result(Err(e)));
                }
            }
        }
    }
}

#[derive(PartialEq, Clone, Copy, Debug)]
enum TaskState {
    Pending,
    Done,
    Cancelled,
}

pub struct Task {
    future: Mutex<Option<BoxFuture<'static, RstbResult>>>,
    state: Mutex<TaskState>,
    name: String,
    join_tx: Mutex<Option<oneshot::Sender<RstbResult>>>,
}

impl Task {
    /// Runs `future` concurrently with the caller. It starts at the caller's next suspension.
    pub fn fork(future: impl Future<Output = RstbResult> + Send + 'static) -> JoinHandle {
        Task::spawn_from_future(future, "forked")
    }

    pub fn spawn_from_future(
        future: impl Future<Output = RstbResult> + Send + 'static,
        name: &str,
    ) -> JoinHandle {
        let (task, join_handle) = Task::new(future.boxed(), name);
        schedule_task(task);
        join_handle
    }

    fn new(fut: BoxFuture<'static, RstbResult>, name: &str) -> (Arc<Self>, JoinHandle) {
        let (tx, rx) = oneshot::channel::<RstbResult>();
        let task = Arc::new(Self {
            future: Mutex::new(Some(fut)),
            state: Mutex::new(TaskState::Pending),
            name: name.to_string(),
            join_tx: Mutex::new(Some(tx)),
        });
        let join_handle = JoinHandle {
            join_rx: rx,
            awaited_task: Some(task.clone()),
        };
        (task, join_handle)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The executor drops a cancelled task instead of polling it.
    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == TaskState::Pending {
            *state = TaskState::Cancelled;
        }
        drop(state);
        // drop the future now so anything it owns is released
        if let Ok(mut slot) = self.future.try_lock() {
            slot.take();
        }
        self.join_tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) == TaskState::Cancelled
    }

    pub fn is_done(&self) -> bool {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) == TaskState::Done
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        schedule_task(arc_self.clone());
    }
}

/// Awaits the result of a spawned task.
pub struct JoinHandle {
    awaited_task: Option<Arc<Task>>,
    join_rx: oneshot::Receiver<RstbResult>,
}

impl JoinHandle {
    pub fn get_task(&self) -> Option<&Arc<Task>> {
        self.awaited_task.as_ref()
    }

    pub fn cancel(mut self) {
        if let Some(task) = self.awaited_task.take() {
            task.cancel();
        }
    }
}

impl Future for JoinHandle {
    type Output = RstbResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TestError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
