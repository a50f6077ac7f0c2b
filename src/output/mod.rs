//! Transfer destinations

use async_trait::async_trait;
use std::fmt;

pub mod file;
pub mod memory;

pub use file::FileDestination;
pub use memory::{MemoryDestination, SharedBuffer};

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Destination could not be opened
    #[error("failed to open destination: {0}")]
    OpenError(String),

    /// IO error while writing
    #[error("IO error: {0}")]
    IoError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),

    /// Partial output could not be removed
    #[error("failed to discard partial output: {0}")]
    DiscardError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Where a transfer's bytes end up.
///
/// A destination is reusable: every transfer attempt opens a fresh [`Sink`]
/// (truncating whatever an earlier attempt left behind).
#[async_trait]
pub trait Destination: Send + Sync + fmt::Debug {
    /// Open a fresh, empty sink.
    async fn open(&self) -> OutputResult<Box<dyn Sink>>;

    /// Remove anything an attempt wrote. Missing output is not an error.
    async fn discard(&self) -> OutputResult<()>;
}

/// Writable side of a destination, exclusively owned by one transfer.
#[async_trait]
pub trait Sink: Send {
    /// Append a chunk.
    async fn write_chunk(&mut self, chunk: &[u8]) -> OutputResult<()>;

    /// Push buffered bytes down to the destination.
    async fn flush(&mut self) -> OutputResult<()>;

    /// Flush and persist once the transfer completed.
    async fn finish(&mut self) -> OutputResult<()>;
}
