//! Main entry point for the pausable-downloader CLI

use clap::Parser;
use pausable_downloader::cli::{Cli, Commands};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pausable_downloader=info"));

    // Logs go to stderr; stdout carries the progress output.
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fetch(ref args) => args.execute(&cli).await.map_err(|e| anyhow::anyhow!(e)),
    };

    // Exit explicitly: the stdin reader cannot be interrupted and would keep
    // the runtime from shutting down.
    match result {
        Ok(status) if status.is_completed() => std::process::exit(0),
        Ok(_) => std::process::exit(1),
        Err(e) => {
            error!("Command failed: {}", e);
            std::process::exit(1);
        }
    }
}
