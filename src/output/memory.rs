//! In-memory destination, for embedding callers that want the bytes back.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Destination, OutputResult, Sink};

/// Byte buffer shared between a [`MemoryDestination`] and its owner.
pub type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Collects a transfer into a shared buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    buffer: SharedBuffer,
}

impl MemoryDestination {
    /// Empty destination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the underlying buffer.
    pub fn buffer(&self) -> SharedBuffer {
        Arc::clone(&self.buffer)
    }

    /// Copy of the bytes written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Destination for MemoryDestination {
    async fn open(&self) -> OutputResult<Box<dyn Sink>> {
        self.buffer.lock().clear();
        Ok(Box::new(MemorySink {
            buffer: self.buffer(),
        }))
    }

    async fn discard(&self) -> OutputResult<()> {
        self.buffer.lock().clear();
        Ok(())
    }
}

struct MemorySink {
    buffer: SharedBuffer,
}

#[async_trait]
impl Sink for MemorySink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> OutputResult<()> {
        self.buffer.lock().extend_from_slice(chunk);
        Ok(())
    }

    async fn flush(&mut self) -> OutputResult<()> {
        Ok(())
    }

    async fn finish(&mut self) -> OutputResult<()> {
        Ok(())
    }
}
