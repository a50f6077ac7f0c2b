//! reqwest-backed connector
//!
//! Sends a plain GET and exposes the response body as an `AsyncRead`, so
//! the engine can pull fixed-size chunks no matter how the server frames
//! its body.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::Client;
use tokio_util::io::StreamReader;
use tracing::debug;

use super::{ConnectError, ConnectResult, Connection, Connector};
use crate::transfer::config::TransferConfig;

/// HTTP(S) connector with explicit connect and read timeouts.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    /// Build a connector using the timeouts from `config`.
    pub fn new(config: &TransferConfig) -> ConnectResult<Self> {
        Self::with_timeouts(config.connect_timeout, config.read_timeout)
    }

    /// Build a connector with explicit timeouts.
    pub fn with_timeouts(connect_timeout: Duration, read_timeout: Duration) -> ConnectResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()
            .map_err(|e| ConnectError::Connect(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn classify(error: reqwest::Error) -> ConnectError {
    if error.is_timeout() {
        ConnectError::Timeout(error.to_string())
    } else if error.is_builder() {
        ConnectError::InvalidUrl(error.to_string())
    } else {
        ConnectError::Connect(error.to_string())
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, url: &str) -> ConnectResult<Connection> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectError::Status(status.as_u16()));
        }

        let content_length = response.content_length();
        debug!(url, status = status.as_u16(), ?content_length, "connection established");

        let stream = response.bytes_stream().map_err(|e| {
            let kind = if e.is_timeout() {
                io::ErrorKind::TimedOut
            } else {
                io::ErrorKind::Other
            };
            io::Error::new(kind, e)
        });

        Ok(Connection::new(
            content_length,
            Box::new(StreamReader::new(Box::pin(stream))),
        ))
    }
}
