//! File destination

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use super::{Destination, OutputError, OutputResult, Sink};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// Writes a transfer to a file on disk.
#[derive(Debug, Clone)]
pub struct FileDestination {
    path: PathBuf,
    buffer_size: usize,
}

impl FileDestination {
    /// Destination at `path`, with the default write buffer.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::new_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Destination at `path` with a custom write buffer size.
    ///
    /// A buffer size of 0 writes every chunk straight through to the file.
    pub fn new_with_buffer_size<P: Into<PathBuf>>(path: P, buffer_size: usize) -> Self {
        Self {
            path: path.into(),
            buffer_size,
        }
    }

    /// Target path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Destination for FileDestination {
    async fn open(&self) -> OutputResult<Box<dyn Sink>> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| OutputError::OpenError(format!("{}: {e}", parent.display())))?;
        }

        let file = File::create(&self.path)
            .await
            .map_err(|e| OutputError::OpenError(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), "destination file created");

        Ok(Box::new(FileSink {
            writer: BufWriter::with_capacity(self.buffer_size.max(1), file),
        }))
    }

    async fn discard(&self) -> OutputResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "partial output removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OutputError::DiscardError(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }
}

struct FileSink {
    writer: BufWriter<File>,
}

#[async_trait]
impl Sink for FileSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> OutputResult<()> {
        self.writer
            .write_all(chunk)
            .await
            .map_err(|e| OutputError::IoError(e.to_string()))
    }

    async fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .await
            .map_err(|e| OutputError::FlushError(e.to_string()))
    }

    async fn finish(&mut self) -> OutputResult<()> {
        self.flush().await?;
        self.writer
            .get_mut()
            .sync_all()
            .await
            .map_err(|e| OutputError::FlushError(e.to_string()))
    }
}
