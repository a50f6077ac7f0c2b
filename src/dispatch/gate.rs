//! Pause gate holding parked continuations
//!
//! [`PauseGate`] is a small synchronization primitive: an atomic paused flag
//! plus a FIFO queue of [`DeferredTask`]s. While the gate is closed, the
//! [`GatedScheduler`](super::GatedScheduler) parks work here instead of
//! handing it to the executor. Reopening the gate releases the parked work in
//! enqueue order, one task at a time: the next task is dispatched only after
//! the previous released task has finished, so a transfer's re-submitted
//! steps can never overtake each other.
//!
//! Parked work is a boxed future sitting in the queue. It holds no thread,
//! and whatever it owns (an open socket, a half-written file) stays alive
//! until it is released or dropped.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::executor::{Executor, Task};
use crate::metrics;

/// Work parked on the gate, together with the executor it resumes on.
pub struct DeferredTask {
    task: Task,
    executor: Arc<dyn Executor>,
}

impl DeferredTask {
    /// Pair a task with the executor that should eventually run it.
    pub fn new(task: Task, executor: Arc<dyn Executor>) -> Self {
        Self { task, executor }
    }

    fn dispatch(self) {
        self.executor.execute(self.task);
    }
}

impl fmt::Debug for DeferredTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredTask").finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Pending {
    queue: VecDeque<DeferredTask>,
    /// A release chain started by `resume()` is still draining `queue`.
    releasing: bool,
}

/// Shared handle to a pause gate.
pub type SharedGate = Arc<PauseGate>;

/// Paused flag plus FIFO queue of deferred continuations.
#[derive(Default)]
pub struct PauseGate {
    paused: AtomicBool,
    pending: Mutex<Pending>,
}

impl PauseGate {
    /// Create an open (not paused) gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an open gate wrapped in [`Arc`].
    pub fn shared() -> SharedGate {
        Arc::new(Self::new())
    }

    /// Whether the gate is currently closed.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Close the gate. Work already running is unaffected.
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            debug!("pause gate closed");
        }
    }

    /// Reopen the gate and start releasing parked work.
    ///
    /// Only the caller that actually flips the flag from paused to resumed
    /// starts a release; every other concurrent call returns `false` and
    /// leaves the queue alone.
    pub fn resume(self: &Arc<Self>) -> bool {
        let first = {
            let mut pending = self.pending.lock();
            if self
                .paused
                .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return false;
            }
            debug!(parked = pending.queue.len(), "pause gate reopened");
            if pending.releasing {
                None
            } else {
                let first = pending.queue.pop_front();
                pending.releasing = first.is_some();
                first
            }
        };

        if let Some(task) = first {
            self.release(task);
        }
        true
    }

    /// Park `task` at the tail of the queue.
    ///
    /// If the gate was reopened after the caller saw it paused and the
    /// release has already drained, the task is dispatched right away
    /// instead of being stranded in an open gate.
    pub fn enqueue(&self, task: DeferredTask) {
        self.enqueue_unless(task, || false);
    }

    /// Like [`enqueue`](Self::enqueue), but dispatch right away when
    /// `bypass` returns `true`.
    ///
    /// `bypass` is evaluated under the queue lock, so a condition that is
    /// set before a [`flush`](Self::flush) can never leave the task parked
    /// behind that flush.
    pub fn enqueue_unless(&self, task: DeferredTask, bypass: impl FnOnce() -> bool) {
        let mut pending = self.pending.lock();
        if (self.is_paused() || pending.releasing) && !bypass() {
            pending.queue.push_back(task);
            trace!(parked = pending.queue.len(), "task parked on pause gate");
            metrics::record_parked_tasks(pending.queue.len());
            return;
        }
        drop(pending);
        task.dispatch();
    }

    /// Hand every parked task back to its executor without reopening the
    /// gate. Returns how many tasks were handed back.
    ///
    /// Continuations that are still live will see the gate closed and park
    /// themselves again; cancelled ones get the chance to observe their
    /// cancellation and finish.
    pub fn flush(&self) -> usize {
        let drained: Vec<DeferredTask> = {
            let mut pending = self.pending.lock();
            pending.queue.drain(..).collect()
        };
        metrics::record_parked_tasks(0);

        let count = drained.len();
        if count > 0 {
            debug!(count, "flushing parked tasks");
        }
        for task in drained {
            task.dispatch();
        }
        count
    }

    /// Number of tasks currently parked.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().queue.len()
    }

    fn release(self: &Arc<Self>, deferred: DeferredTask) {
        let DeferredTask { task, executor } = deferred;
        let guard = ReleaseNext(Arc::clone(self));
        executor.execute(Box::pin(async move {
            let _guard = guard;
            task.await;
        }));
    }

    fn release_next(self: &Arc<Self>) {
        let next = {
            let mut pending = self.pending.lock();
            let next = if self.is_paused() {
                None
            } else {
                pending.queue.pop_front()
            };
            if next.is_none() {
                pending.releasing = false;
            }
            metrics::record_parked_tasks(pending.queue.len());
            next
        };

        if let Some(task) = next {
            self.release(task);
        }
    }
}

impl fmt::Debug for PauseGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PauseGate")
            .field("paused", &self.is_paused())
            .field("pending", &self.pending_len())
            .finish()
    }
}

/// Continues the release chain once the released task is done, even if the
/// task panicked or was dropped.
struct ReleaseNext(Arc<PauseGate>);

impl Drop for ReleaseNext {
    fn drop(&mut self) {
        self.0.release_next();
    }
}
