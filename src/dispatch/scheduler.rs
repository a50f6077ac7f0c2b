//! Pause-aware dispatch adapter

use std::fmt;
use std::sync::Arc;

use super::executor::{Executor, Task};
use super::gate::{DeferredTask, SharedGate};
use crate::cancel::CancelToken;

/// Routes work to an executor, or parks it on the gate while paused.
///
/// The scheduler carries no state of its own beyond the gate and the
/// executor, so clones are cheap and all dispatch through the same gate.
#[derive(Clone)]
pub struct GatedScheduler {
    gate: SharedGate,
    executor: Arc<dyn Executor>,
}

impl GatedScheduler {
    /// Create a scheduler in front of `executor`.
    pub fn new(gate: SharedGate, executor: Arc<dyn Executor>) -> Self {
        Self { gate, executor }
    }

    /// Run `task` now, or park it until the gate reopens.
    ///
    /// A task dispatched right as the gate reopens either runs directly or
    /// lands in the queue before the release reads it; the gate's own lock
    /// decides which.
    pub fn dispatch(&self, task: Task) {
        if self.gate.is_paused() {
            self.gate
                .enqueue(DeferredTask::new(task, Arc::clone(&self.executor)));
        } else {
            self.executor.execute(task);
        }
    }

    /// Like [`dispatch`](Self::dispatch), but a task whose `cancel` token is
    /// set never parks: it runs right away so it can finish.
    pub fn dispatch_cancellable(&self, task: Task, cancel: &CancelToken) {
        if self.gate.is_paused() {
            self.gate.enqueue_unless(
                DeferredTask::new(task, Arc::clone(&self.executor)),
                || cancel.is_cancelled(),
            );
        } else {
            self.executor.execute(task);
        }
    }

    /// The gate this scheduler consults.
    pub fn gate(&self) -> &SharedGate {
        &self.gate
    }
}

impl fmt::Debug for GatedScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatedScheduler")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}
