//! Transfer configuration constants

use std::time::Duration;

/// Bytes read from the connection per step.
/// Pause and cancel latency is bounded by one chunk, so the chunk is kept
/// small; it is a tunable, not a protocol requirement.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Time allowed to establish the TCP/TLS connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed between two successful reads of the response body.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Emit a progress event every time this many new bytes were written.
pub const DEFAULT_PROGRESS_STEP: u64 = 64 * 1024; // 64 KiB

/// Tunables for a transfer and the connector that feeds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Bytes read per step.
    pub chunk_size: usize,
    /// Connect timeout enforced by the connector.
    pub connect_timeout: Duration,
    /// Read timeout enforced by the connector.
    pub read_timeout: Duration,
    /// Minimum number of newly written bytes between two progress events.
    pub progress_step: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
            progress_step: DEFAULT_PROGRESS_STEP,
        }
    }
}

impl TransferConfig {
    /// Set the chunk size. Zero is clamped to one byte.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the progress step. Zero or one reports every chunk.
    pub fn with_progress_step(mut self, progress_step: u64) -> Self {
        self.progress_step = progress_step;
        self
    }
}
