//! CLI error types and conversions

use crate::connector::ConnectError;

/// CLI errors
///
/// Transfer failures are not errors here: they end as a terminal status.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Connector could not be built
    #[error("connector error: {0}")]
    ConnectError(#[from] ConnectError),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
