//! Underlying executors that gated work is eventually handed to

use futures_util::future::BoxFuture;
use tokio::runtime::Handle;

/// A unit of work: one step of a transfer, or any other boxed future.
pub type Task = BoxFuture<'static, ()>;

/// Something that can run a [`Task`] to completion in the background.
///
/// Implementations must not run the task inline on the caller's stack:
/// controls such as `resume()` dispatch released work and must return
/// immediately.
pub trait Executor: Send + Sync + 'static {
    /// Hand `task` over for execution.
    fn execute(&self, task: Task);
}

/// Executor backed by a Tokio runtime handle.
///
/// Steps are spawned as regular tasks on the runtime's worker threads; the
/// file writes inside them go through `tokio::fs`, which delegates to the
/// runtime's blocking pool.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    /// Wrap an explicit runtime handle.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is currently running on.
    ///
    /// # Panics
    /// Panics when called outside of a Tokio runtime, like `tokio::spawn`.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Like [`TokioExecutor::current`], but returns `None` outside a runtime.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, task: Task) {
        // Detached: completion is reported through the task's own channels.
        drop(self.handle.spawn(task));
    }
}
