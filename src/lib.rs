//! # Pausable Downloader Library
//!
//! Chunked HTTP downloads that can be paused, resumed and cancelled
//! cooperatively, without tearing down the connection or losing bytes that
//! were already written.
//!
//! ## Features
//!
//! - **Pause at chunk granularity**: a paused transfer keeps its socket open
//!   and its last chunk in memory, and consumes no thread while parked
//! - **FIFO resume**: parked work is released in the order it was parked
//! - **Cancel anytime**: cancellation is honored even while paused and
//!   deletes partial output
//! - **Switch-to-latest**: starting a new download supersedes the running
//!   one, and subscribers only see events of the newest session
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use pausable_downloader::{FileDestination, HttpConnector, SessionController, TransferConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TransferConfig::default();
//! let connector = Arc::new(HttpConnector::new(&config)?);
//! let destination = Arc::new(FileDestination::new("./file.bin"));
//! let controller = SessionController::new(connector, destination);
//!
//! let handle = controller.start("https://example.com/file.bin");
//! controller.pause();
//! controller.resume();
//! println!("{}", handle.wait().await);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`dispatch`] - pause gate, gated scheduler and the executors behind it
//! - [`transfer`] - the chunked copy loop and the events it reports
//! - [`session`] - start/pause/resume/cancel controls with switch-to-latest
//! - [`connector`] - where bytes come from (HTTP via reqwest)
//! - [`output`] - where bytes go (file or memory)
//! - [`cancel`] - per-session cancellation flag
//! - [`metrics`] - counters and gauges, optionally exported to Prometheus

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Per-session cancellation flag
pub mod cancel;

/// CLI command implementations
pub mod cli;

/// Byte sources
pub mod connector;

/// Pause-aware task dispatch
pub mod dispatch;

/// Observability metrics
pub mod metrics;

/// Transfer destinations
pub mod output;

/// Switch-to-latest session control
pub mod session;

/// Chunked transfers
pub mod transfer;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use connector::{Connector, HttpConnector};
pub use dispatch::{GatedScheduler, PauseGate, TokioExecutor};
pub use output::{Destination, FileDestination, MemoryDestination};
pub use session::SessionController;
pub use transfer::{
    SessionEvent, SessionId, TransferConfig, TransferEvent, TransferHandle, TransferPhase,
    TransferStatus,
};
