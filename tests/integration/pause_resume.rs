//! Integration tests for pausing and resuming a running transfer

use std::sync::Arc;
use std::time::Duration;

use pausable_downloader::{
    FileDestination, MemoryDestination, SessionController, TransferConfig, TransferEvent,
    TransferPhase, TransferStatus,
};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

use crate::support::{collect_until_finished, pattern, wait_until, ScriptedConnector, TEST_TIMEOUT};

const URL: &str = "scripted://file.bin";

fn small_chunks() -> TransferConfig {
    TransferConfig::default()
        .with_chunk_size(16)
        .with_progress_step(1)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_toggling_pause_keeps_bytes_in_order() {
    let connector = ScriptedConnector::new();
    let expected = pattern(8192);
    let mut feed = connector.feed(URL, Some(expected.len() as u64));

    let destination = Arc::new(MemoryDestination::new());
    let controller =
        SessionController::new(connector.clone(), destination.clone()).with_config(small_chunks());
    let handle = controller.start(URL);

    for (i, piece) in expected.chunks(256).enumerate() {
        match i % 4 {
            0 => controller.pause(),
            2 => {
                controller.resume();
            }
            _ => {}
        }
        feed.write_all(piece).await.unwrap();
        tokio::task::yield_now().await;
    }
    controller.resume();
    drop(feed);

    let status = tokio::time::timeout(TEST_TIMEOUT, handle.wait()).await.unwrap();
    assert_eq!(status, TransferStatus::Completed { bytes: 8192 });
    assert_eq!(destination.contents(), expected, "bytes duplicated, lost or reordered");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_bytes_written_while_paused() {
    let connector = ScriptedConnector::new();
    let mut feed = connector.feed(URL, Some(128));

    let destination = Arc::new(MemoryDestination::new());
    let controller =
        SessionController::new(connector.clone(), destination.clone()).with_config(small_chunks());
    let handle = controller.start(URL);

    feed.write_all(&[1u8; 64]).await.unwrap();
    wait_until(|| destination.len() == 64).await;

    controller.pause();
    feed.write_all(&[2u8; 64]).await.unwrap();
    wait_until(|| controller.gate().pending_len() == 1).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(destination.len(), 64);
    assert_eq!(handle.phase(), TransferPhase::Streaming);

    assert!(controller.resume());
    drop(feed);

    let status = tokio::time::timeout(TEST_TIMEOUT, handle.wait()).await.unwrap();
    assert_eq!(status, TransferStatus::Completed { bytes: 128 });

    let mut expected = vec![1u8; 64];
    expected.extend_from_slice(&[2u8; 64]);
    assert_eq!(destination.contents(), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_paused_file_reflects_pause_point_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.bin");

    let connector = ScriptedConnector::new();
    let mut feed = connector.feed(URL, None);
    let controller = SessionController::new(connector.clone(), Arc::new(FileDestination::new(&path)))
        .with_config(small_chunks());
    let handle = controller.start(URL);

    feed.write_all(&[9u8; 100]).await.unwrap();
    wait_until(|| handle.phase() == TransferPhase::Streaming).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    controller.pause();
    // Unblocks the pending read; the step then parks and flushes.
    feed.write_all(&[8u8; 16]).await.unwrap();
    wait_until(|| controller.gate().pending_len() == 1).await;

    let on_disk = std::fs::metadata(&path).unwrap().len();
    assert_eq!(on_disk, 100, "buffered bytes must reach the file once paused");

    controller.resume();
    drop(feed);
    let status = tokio::time::timeout(TEST_TIMEOUT, handle.wait()).await.unwrap();
    assert_eq!(status, TransferStatus::Completed { bytes: 116 });
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 116);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_start_while_paused_waits_before_connecting() {
    let connector = ScriptedConnector::new();
    connector.serve(URL, &pattern(512), 64);

    let destination = Arc::new(MemoryDestination::new());
    let controller =
        SessionController::new(connector.clone(), destination.clone()).with_config(small_chunks());
    controller.pause();

    let handle = controller.start(URL);
    wait_until(|| controller.gate().pending_len() == 1).await;
    assert_eq!(connector.connects(), 0);
    assert_eq!(handle.phase(), TransferPhase::Idle);

    controller.resume();
    let status = tokio::time::timeout(TEST_TIMEOUT, handle.wait()).await.unwrap();
    assert_eq!(status, TransferStatus::Completed { bytes: 512 });
    assert_eq!(connector.connects(), 1);
    assert_eq!(destination.contents(), pattern(512));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_resume_twice_reports_single_transition() {
    let connector = ScriptedConnector::new();
    let destination = Arc::new(MemoryDestination::new());
    let controller = SessionController::new(connector, destination);

    assert!(!controller.resume());
    controller.pause();
    controller.pause();
    assert!(controller.is_paused());
    assert!(controller.resume());
    assert!(!controller.resume());
    assert!(!controller.is_paused());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_progress_events_are_monotonic() {
    let connector = ScriptedConnector::new();
    let body = pattern(4000);
    connector.serve(URL, &body, 100);

    let controller = SessionController::new(connector, Arc::new(MemoryDestination::new()))
        .with_config(TransferConfig::default().with_chunk_size(256).with_progress_step(1000));
    let mut events = controller.subscribe();
    controller.start(URL);

    let events = collect_until_finished(&mut events).await;
    assert!(matches!(
        events.first().map(|e| &e.event),
        Some(TransferEvent::Started { total: Some(4000), .. })
    ));

    let progress: Vec<u64> = events
        .iter()
        .filter_map(|e| match e.event {
            TransferEvent::Progress { bytes, .. } => Some(bytes),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(progress.last(), Some(&4000));
    assert!(progress.len() >= 4);

    assert_eq!(
        events.last().map(|e| &e.event),
        Some(&TransferEvent::Finished(TransferStatus::Completed { bytes: 4000 }))
    );
}
