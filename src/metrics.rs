//! Transfer and pause-gate metrics
//!
//! Counters and gauges are emitted through the `metrics` facade. Without an
//! installed recorder every macro is a no-op, so library users pay nothing
//! unless they call [`init_metrics`].
//!
//! ## Metrics
//!
//! - `transfers_started_total` - transfers that began connecting
//! - `transfers_completed_total` / `transfers_canceled_total` /
//!   `transfers_failed_total` - terminal outcomes
//! - `transfer_bytes_written_total` - bytes written to destinations
//! - `transfer_duration_seconds` - time from connect to terminal status
//! - `pause_gate_pending_tasks` - continuations parked on the gate

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::transfer::TransferStatus;

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Install the Prometheus exporter and describe every metric.
///
/// Idempotent: later calls return `Ok(())` without touching the recorder.
///
/// # Arguments
/// * `addr` - Socket address of the scrape endpoint (e.g. "127.0.0.1:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "transfers_started_total",
        Unit::Count,
        "Total number of transfers that started connecting"
    );

    describe_counter!(
        "transfers_completed_total",
        Unit::Count,
        "Total number of transfers that completed"
    );

    describe_counter!(
        "transfers_canceled_total",
        Unit::Count,
        "Total number of transfers cancelled on request"
    );

    describe_counter!(
        "transfers_failed_total",
        Unit::Count,
        "Total number of transfers that failed"
    );

    describe_counter!(
        "transfer_bytes_written_total",
        Unit::Bytes,
        "Total number of bytes written to destinations"
    );

    describe_histogram!(
        "transfer_duration_seconds",
        Unit::Seconds,
        "Time from connect to terminal status"
    );

    describe_gauge!(
        "pause_gate_pending_tasks",
        Unit::Count,
        "Continuations currently parked on the pause gate"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Record a transfer entering the connecting phase.
pub fn record_transfer_started() {
    counter!("transfers_started_total").increment(1);
}

/// Record the terminal status of a transfer.
pub fn record_transfer_finished(status: &TransferStatus, elapsed: Option<Duration>) {
    match status {
        TransferStatus::Completed { .. } => counter!("transfers_completed_total").increment(1),
        TransferStatus::Canceled => counter!("transfers_canceled_total").increment(1),
        TransferStatus::Failed { status_code, .. } => {
            let code = status_code.map_or_else(|| "none".to_string(), |c| c.to_string());
            counter!("transfers_failed_total", "status_code" => code).increment(1);
        }
    }

    if let Some(elapsed) = elapsed {
        let outcome = match status {
            TransferStatus::Completed { .. } => "completed",
            TransferStatus::Canceled => "canceled",
            TransferStatus::Failed { .. } => "failed",
        };
        histogram!("transfer_duration_seconds", "outcome" => outcome).record(elapsed.as_secs_f64());
    }
}

/// Record bytes written to a destination.
pub fn record_bytes_written(bytes: u64) {
    counter!("transfer_bytes_written_total").increment(bytes);
}

/// Update the parked-continuations gauge.
pub fn record_parked_tasks(parked: usize) {
    gauge!("pause_gate_pending_tasks").set(parked as f64);
}
