//! Network sources a transfer reads from
//!
//! The engine never talks to an HTTP client directly. It asks a
//! [`Connector`] to open a URL and gets back a [`Connection`]: an optional
//! content length plus a plain byte reader. Timeouts, TLS and redirects are
//! the connector's business.

use async_trait::async_trait;
use std::fmt;
use tokio::io::AsyncRead;

pub mod http;

pub use http::HttpConnector;

/// Connection errors
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Server answered with a non-success status
    #[error("HTTP error code: {0}")]
    Status(u16),

    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Connect or read timeout elapsed
    #[error("timed out: {0}")]
    Timeout(String),

    /// Malformed or unsupported URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl ConnectError {
    /// HTTP status code carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// Result type for connector operations
pub type ConnectResult<T> = Result<T, ConnectError>;

/// Body reader handed out by a connector.
pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;

/// An open response body.
///
/// Dropping the connection releases the underlying socket.
pub struct Connection {
    /// Length announced by the server, if any.
    pub content_length: Option<u64>,
    /// Response body.
    pub body: BodyReader,
}

impl Connection {
    /// Wrap a reader with an optional known length.
    pub fn new(content_length: Option<u64>, body: BodyReader) -> Self {
        Self {
            content_length,
            body,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Opens connections for the transfer engine.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open `url` and return its body once the server accepted the request.
    ///
    /// Implementations must reject non-success responses with
    /// [`ConnectError::Status`] before any body byte is handed out.
    async fn connect(&self, url: &str) -> ConnectResult<Connection>;
}
