//! Progress tracking for a running transfer.
//!
//! The engine feeds every written chunk into a [`ProgressState`], which
//! decides when a new `Progress` event is due and can render a one-line
//! summary (percentage, throughput, remaining time) for logs and the CLI.

use std::time::{Duration, Instant};

/// Byte counters and rate estimation for one transfer attempt.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Bytes written to the destination so far.
    pub bytes_written: u64,
    /// Total size announced by the server, if any.
    pub total_expected: Option<u64>,
    /// When the attempt started streaming.
    pub start_time: Instant,
    /// Current throughput (bytes per second).
    pub current_rate: f64,
    /// Byte count at the last emitted progress event.
    pub last_reported: u64,
    /// Minimum number of new bytes between two progress events.
    pub step: u64,
}

impl ProgressState {
    /// Start tracking a transfer of `total_expected` bytes.
    pub fn new(total_expected: Option<u64>, step: u64) -> Self {
        Self {
            bytes_written: 0,
            total_expected,
            start_time: Instant::now(),
            current_rate: 0.0,
            last_reported: 0,
            step: step.max(1),
        }
    }

    /// Account for `written` new bytes.
    pub fn update(&mut self, written: u64) {
        self.bytes_written = self.bytes_written.saturating_add(written);
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.current_rate = self.bytes_written as f64 / elapsed;
        }
    }

    /// Whether enough new bytes arrived since the last event.
    pub fn should_emit_update(&self) -> bool {
        self.bytes_written > 0 && self.bytes_written - self.last_reported >= self.step
    }

    /// Call after emitting a progress event.
    pub fn mark_emitted(&mut self) {
        self.last_reported = self.bytes_written;
    }

    /// Completion percentage (0-100), when the total is known.
    pub fn percentage(&self) -> Option<f64> {
        self.total_expected.map(|total| {
            if total == 0 {
                100.0
            } else {
                ((self.bytes_written as f64 / total as f64) * 100.0).min(100.0)
            }
        })
    }

    /// Remaining time at the current rate, when the total is known.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        let total = self.total_expected?;
        if self.current_rate <= 0.0 {
            return None;
        }
        let remaining = total.saturating_sub(self.bytes_written);
        Some(Duration::from_secs_f64(remaining as f64 / self.current_rate))
    }

    /// Human-readable progress string for logging.
    pub fn format_progress(&self) -> String {
        let mut parts = vec![format!("Downloaded {}", format_bytes(self.bytes_written))];

        if let Some(total) = self.total_expected {
            parts.push(format!("of {}", format_bytes(total)));
        }

        if let Some(pct) = self.percentage() {
            parts.push(format!("- {pct:.1}% complete"));
        }

        if self.current_rate > 0.0 {
            parts.push(format!("at {}/s", format_bytes(self.current_rate as u64)));
        }

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

/// Render a byte count with a binary unit suffix.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.1} {unit}")
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
