//! CLI command implementations

pub mod control;
pub mod error;
pub mod fetch;

pub use control::ControlCommand;
pub use error::CliError;
pub use fetch::{Cli, Commands, FetchArgs, OutputFormat};
