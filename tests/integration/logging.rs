//! Integration tests for logging and tracing
//!
//! Each test installs a thread-local subscriber writing into a buffer and
//! runs the transfer on a current-thread runtime, so every engine step logs
//! through that subscriber.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use pausable_downloader::{MemoryDestination, SessionController, TransferStatus};
use tracing_subscriber::EnvFilter;

use crate::support::{pattern, ScriptedConnector, TEST_TIMEOUT};

const URL: &str = "scripted://logged.bin";

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

async fn run_transfer(len: usize) {
    let connector = ScriptedConnector::new();
    connector.serve(URL, &pattern(len), 128);
    let controller = SessionController::new(connector, Arc::new(MemoryDestination::new()));

    controller.pause();
    let handle = controller.start(URL);
    controller.resume();

    let status = tokio::time::timeout(TEST_TIMEOUT, handle.wait()).await.unwrap();
    assert_eq!(status, TransferStatus::Completed { bytes: len as u64 });
}

#[tokio::test]
async fn test_transfer_lifecycle_is_logged() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("pausable_downloader=debug"))
        .with_ansi(false)
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    run_transfer(2048).await;

    let text = logs.text();
    assert!(text.contains("transfer scheduled"), "{text}");
    assert!(text.contains("connecting"), "{text}");
    assert!(text.contains("download completed"), "{text}");
    assert!(text.contains("bytes=2048"), "{text}");
    assert!(text.contains("session=#1"), "{text}");
}

#[tokio::test]
async fn test_json_logs_carry_structured_fields() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new("pausable_downloader=info"))
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    run_transfer(512).await;

    let lines: Vec<serde_json::Value> = logs
        .text()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let completed = lines
        .iter()
        .find(|line| line["fields"]["message"] == "download completed")
        .expect("completion is logged");

    assert_eq!(completed["level"], "INFO");
    assert_eq!(completed["fields"]["bytes"], 512);
    assert_eq!(completed["fields"]["url"], URL);
}

#[tokio::test]
async fn test_filter_drops_debug_events() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn,pausable_downloader::transfer=info"))
        .with_ansi(false)
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    run_transfer(256).await;

    let text = logs.text();
    assert!(text.contains("download completed"), "{text}");
    assert!(!text.contains("transfer scheduled"), "{text}");
    assert!(!text.contains("starting transfer"), "{text}");
}
