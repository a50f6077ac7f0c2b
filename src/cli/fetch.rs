//! Fetch command implementation

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::{CliError, ControlCommand};
use crate::connector::HttpConnector;
use crate::output::FileDestination;
use crate::session::SessionController;
use crate::transfer::config::{DEFAULT_CHUNK_SIZE, DEFAULT_PROGRESS_STEP};
use crate::transfer::{SessionEvent, TransferConfig, TransferEvent, TransferStatus};

/// Largest accepted chunk size (16 MiB)
const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Parse and validate chunk size value
fn parse_chunk_size(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("chunk size must be at least 1".to_string());
    }
    if value > MAX_CHUNK_SIZE {
        return Err(format!(
            "chunk size {value} exceeds maximum of {MAX_CHUNK_SIZE}"
        ));
    }
    Ok(value)
}

/// Pausable downloader CLI
#[derive(Parser, Debug)]
#[command(name = "pausable-downloader")]
#[command(about = "Download a file over HTTP with pause, resume and cancel", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a URL into a file
    ///
    /// While the download runs, type `pause`, `resume`, `cancel` or
    /// `start <url>` on stdin. Ctrl+C cancels.
    Fetch(FetchArgs),
}

/// Fetch command arguments
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// URL to download
    pub url: String,

    /// Destination file (truncated on start, deleted on cancel)
    #[arg(long, short)]
    pub output: PathBuf,

    /// Bytes read per step; pause and cancel take effect at chunk boundaries
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_chunk_size)]
    pub chunk_size: usize,

    /// Connect timeout in seconds
    #[arg(long, default_value = "10")]
    pub connect_timeout: u64,

    /// Read timeout in seconds
    #[arg(long, default_value = "10")]
    pub read_timeout: u64,

    /// Bytes between two progress updates
    #[arg(long, default_value_t = DEFAULT_PROGRESS_STEP)]
    pub progress_step: u64,

    /// Start with the transfer paused; type `resume` to begin
    #[arg(long, default_value_t = false)]
    pub start_paused: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output, one event per line
    Json,
    /// Human-readable output with a progress bar
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl FetchArgs {
    /// Transfer configuration from the command line flags.
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig::default()
            .with_chunk_size(self.chunk_size)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout))
            .with_read_timeout(Duration::from_secs(self.read_timeout))
            .with_progress_step(self.progress_step)
    }

    /// Run the download until the latest session reaches a terminal status.
    pub async fn execute(&self, cli: &Cli) -> Result<TransferStatus, CliError> {
        if let Some(addr) = cli.metrics_addr {
            crate::metrics::init_metrics(addr)
                .await
                .map_err(|e| CliError::ConfigurationError(e.to_string()))?;
        }

        let config = self.transfer_config();
        let connector = Arc::new(HttpConnector::new(&config)?);
        let destination = Arc::new(FileDestination::new(&self.output));
        let controller = SessionController::new(connector, destination).with_config(config);
        let mut events = controller.subscribe();
        let mut reporter = Reporter::new(cli.output_format);

        if self.start_paused {
            controller.pause();
            reporter.notice("Paused, type `resume` to start");
        }
        info!(url = %self.url, output = %self.output.display(), "starting download");
        controller.start(&self.url);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut interrupted = false;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        return Err(CliError::ConfigurationError("event stream closed".to_string()));
                    };
                    // Superseded while this event was in flight.
                    if event.session != controller.current_session() {
                        continue;
                    }
                    reporter.on_event(&event);
                    if let TransferEvent::Finished(status) = event.event {
                        return Ok(status);
                    }
                }
                line = lines.next_line(), if stdin_open => match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match line.parse::<ControlCommand>() {
                        Ok(command) => apply(&controller, command, &reporter),
                        Err(e) => reporter.notice(&e),
                    },
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!(error = %e, "failed to read stdin, interactive controls disabled");
                        stdin_open = false;
                    }
                },
                result = &mut ctrl_c, if !interrupted => {
                    interrupted = true;
                    if result.is_ok() {
                        warn!("Ctrl+C received - cancelling download");
                        controller.cancel();
                    }
                }
            }
        }
    }
}

fn apply(controller: &SessionController, command: ControlCommand, reporter: &Reporter) {
    info!(%command, "control command");
    match command {
        ControlCommand::Pause => {
            controller.pause();
            reporter.notice("Paused");
        }
        ControlCommand::Resume => {
            if controller.resume() {
                reporter.notice("Resumed");
            } else {
                reporter.notice("Not paused");
            }
        }
        ControlCommand::Cancel => {
            if !controller.cancel() {
                reporter.notice("Nothing to cancel");
            }
        }
        ControlCommand::Start(url) => {
            let handle = controller.start(&url);
            reporter.notice(&format!("Switched to {url} (session {})", handle.session()));
        }
    }
}

/// Renders session events for the terminal.
struct Reporter {
    format: OutputFormat,
    bar: Option<ProgressBar>,
}

impl Reporter {
    fn new(format: OutputFormat) -> Self {
        Self { format, bar: None }
    }

    fn on_event(&mut self, event: &SessionEvent) {
        match self.format {
            OutputFormat::Json => output_json(event),
            OutputFormat::Human => self.output_human(event),
        }
    }

    fn output_human(&mut self, event: &SessionEvent) {
        match &event.event {
            TransferEvent::Started { url, total } => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_and_clear();
                }
                self.bar = Some(create_progress_bar(url, *total));
            }
            TransferEvent::Progress { bytes, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_position(*bytes);
                }
            }
            TransferEvent::Finished(status) => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_and_clear();
                }
                if status.is_failed() {
                    eprintln!("{status}");
                } else {
                    println!("{status}");
                }
            }
        }
    }

    fn notice(&self, message: &str) {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "notice": message }));
            }
            OutputFormat::Human => match &self.bar {
                Some(bar) => bar.println(message),
                None => eprintln!("{message}"),
            },
        }
    }
}

/// Output one event as a JSON line
fn output_json(event: &SessionEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "failed to serialize event"),
    }
}

/// Create progress bar with style
fn create_progress_bar(url: &str, total: Option<u64>) -> ProgressBar {
    let (bar, template) = match total {
        Some(total) => (
            ProgressBar::new(total),
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
        ),
        None => (
            ProgressBar::new_spinner(),
            "{spinner:.green} [{elapsed_precise}] {bytes} ({bytes_per_sec}) {msg}",
        ),
    };

    let style = ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    bar.set_style(style);
    bar.set_message(format!("Downloading {url}"));
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
