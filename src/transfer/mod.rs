//! Cancellable, pausable chunked transfers
//!
//! This module holds the streaming copy loop and the values it reports.
//!
//! # Overview
//!
//! A transfer moves through a small state machine:
//!
//! ```text
//! Idle -> Connecting -> Streaming -> { Completed | Canceled | Failed }
//! ```
//!
//! Each transition happens inside a discrete step scheduled through a
//! [`GatedScheduler`](crate::dispatch::GatedScheduler). While streaming, one
//! step moves one chunk: read, check cancellation, check the pause gate,
//! write. A paused transfer is a parked step holding its open connection and
//! the chunk it already read.
//!
//! # Components
//!
//! - [`engine`] - the step machine ([`TransferEngine`])
//! - [`config`] - chunk size, timeouts and progress cadence
//! - [`progress`] - byte counters and throughput estimation
//!
//! # Error Handling
//!
//! Nothing escapes the engine as an error. Every failure is turned into a
//! [`TransferStatus::Failed`] carrying a readable message; cancellation is
//! reported as [`TransferStatus::Canceled`] and is not a failure.

use serde::Serialize;
use std::fmt;

use crate::connector::ConnectError;
use crate::output::OutputError;

pub mod config;
pub mod engine;
pub mod progress;

pub use config::TransferConfig;
pub use engine::{EventSink, TransferEngine, TransferHandle};
pub use progress::ProgressState;

/// Transfer errors
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Connection error (non-2xx status, failed connect, timeout)
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Destination error (open, write, flush)
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// IO error while reading the response body
    #[error("read error: {0}")]
    Read(String),
}

impl TransferError {
    /// HTTP status code behind the failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Connect(e) => e.status_code(),
            _ => None,
        }
    }
}

/// Identity of one transfer attempt. Newer sessions have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Terminal outcome of a transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferStatus {
    /// End of stream reached and every byte written
    Completed {
        /// Bytes written to the destination
        bytes: u64,
    },
    /// Cancelled on request; partial output was discarded
    Canceled,
    /// Connection or IO failure; partial output is left as-is
    Failed {
        /// Human-readable reason
        message: String,
        /// HTTP status code, when the server rejected the request
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },
}

impl TransferStatus {
    /// Build a `Failed` status from an error.
    pub fn failed(error: &TransferError) -> Self {
        Self::Failed {
            message: error.to_string(),
            status_code: error.status_code(),
        }
    }

    /// Whether the transfer completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Whether the transfer was cancelled.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Whether the transfer failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { bytes } => write!(f, "Download completed! ({bytes} bytes)"),
            Self::Canceled => write!(f, "Download canceled!"),
            Self::Failed { message, .. } => write!(f, "Error downloading file: {message}"),
        }
    }
}

/// Event emitted by a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum TransferEvent {
    /// Connection accepted, streaming begins
    Started {
        /// Requested URL
        url: String,
        /// Size announced by the server
        total: Option<u64>,
    },
    /// Bytes written so far
    Progress {
        /// Bytes written to the destination
        bytes: u64,
        /// Size announced by the server
        total: Option<u64>,
    },
    /// Terminal status; always the last event of a session
    Finished(TransferStatus),
}

impl TransferEvent {
    /// Whether this is the terminal event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Event stamped with the session it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEvent {
    /// Originating session
    pub session: SessionId,
    /// The event itself
    pub event: TransferEvent,
}

/// Lifecycle phase of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPhase {
    /// Scheduled, not yet connecting
    Idle,
    /// Opening the connection and the destination
    Connecting,
    /// Copying chunks
    Streaming,
    /// Finished successfully
    Completed,
    /// Cancelled
    Canceled,
    /// Failed
    Failed,
}

impl TransferPhase {
    /// Terminal phases are absorbing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Failed)
    }
}

impl From<&TransferStatus> for TransferPhase {
    fn from(status: &TransferStatus) -> Self {
        match status {
            TransferStatus::Completed { .. } => Self::Completed,
            TransferStatus::Canceled => Self::Canceled,
            TransferStatus::Failed { .. } => Self::Failed,
        }
    }
}
