//! Pause-aware task dispatch
//!
//! Work flows through three pieces:
//!
//! 1. [`Executor`] - runs a boxed future in the background ([`TokioExecutor`])
//! 2. [`PauseGate`] - paused flag plus FIFO queue of parked work
//! 3. [`GatedScheduler`] - asks the gate before handing work to the executor
//!
//! A long-running job that wants to be pausable mid-stream splits itself into
//! small steps and re-submits each next step through the scheduler. Pausing
//! the gate then parks the job at its next step boundary, and resuming
//! releases it exactly where it stopped.

pub mod executor;
pub mod gate;
pub mod scheduler;

pub use executor::{Executor, Task, TokioExecutor};
pub use gate::{DeferredTask, PauseGate, SharedGate};
pub use scheduler::GatedScheduler;
