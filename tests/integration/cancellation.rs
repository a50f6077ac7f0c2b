//! Integration tests for cancelling transfers

use std::sync::Arc;
use std::time::Duration;

use pausable_downloader::{
    FileDestination, MemoryDestination, SessionController, TransferConfig, TransferEvent, TransferPhase,
    TransferStatus,
};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

use crate::support::{
    collect_until_finished, finished, wait_until, PausingDestination, ScriptedConnector,
    TEST_TIMEOUT,
};

const URL: &str = "scripted://large.bin";

fn controller_for(connector: Arc<ScriptedConnector>, destination: FileDestination) -> SessionController {
    SessionController::new(connector, Arc::new(destination))
        .with_config(TransferConfig::default().with_chunk_size(32))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_deletes_partial_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("large.bin");

    let connector = ScriptedConnector::new();
    let mut feed = connector.feed(URL, Some(1_000_000));
    let controller = controller_for(connector, FileDestination::new(&path));
    let mut events = controller.subscribe();
    let handle = controller.start(URL);

    feed.write_all(&[5u8; 4096]).await.unwrap();
    wait_until(|| path.exists()).await;

    assert!(controller.cancel());
    assert!(!controller.cancel(), "second cancel is a no-op");
    // The next read returns and the step boundary observes the token.
    feed.write_all(&[5u8; 32]).await.unwrap();

    let status = tokio::time::timeout(TEST_TIMEOUT, handle.wait()).await.unwrap();
    assert_eq!(status, TransferStatus::Canceled);
    assert_eq!(handle.phase(), TransferPhase::Canceled);
    assert!(!path.exists(), "partial output must be removed on cancel");

    let events = collect_until_finished(&mut events).await;
    let terminal = finished(&events);
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].event, TransferEvent::Finished(TransferStatus::Canceled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_while_paused_terminates_without_resume() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("large.bin");

    let connector = ScriptedConnector::new();
    let mut feed = connector.feed(URL, None);
    let controller = controller_for(connector, FileDestination::new(&path));
    let handle = controller.start(URL);

    feed.write_all(&[1u8; 256]).await.unwrap();
    wait_until(|| handle.phase() == TransferPhase::Streaming).await;

    controller.pause();
    feed.write_all(&[2u8; 32]).await.unwrap();
    wait_until(|| controller.gate().pending_len() == 1).await;

    assert!(controller.cancel());
    let status = tokio::time::timeout(TEST_TIMEOUT, handle.wait()).await.unwrap();

    assert_eq!(status, TransferStatus::Canceled);
    assert!(!path.exists());
    assert!(controller.is_paused(), "cancel must not reopen the gate");
    assert_eq!(controller.gate().pending_len(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_before_connect_never_connects() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("never.bin");

    let connector = ScriptedConnector::new();
    let _feed = connector.feed(URL, None);
    let controller = controller_for(connector.clone(), FileDestination::new(&path));

    controller.pause();
    let handle = controller.start(URL);
    assert!(controller.cancel());

    let status = tokio::time::timeout(TEST_TIMEOUT, handle.wait()).await.unwrap();
    assert_eq!(status, TransferStatus::Canceled);
    assert_eq!(connector.connects(), 0);
    assert!(!path.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_without_session_is_noop() {
    let dir = TempDir::new().unwrap();
    let controller = controller_for(
        ScriptedConnector::new(),
        FileDestination::new(dir.path().join("none.bin")),
    );

    assert!(!controller.cancel());
    assert_eq!(controller.current_session().0, 0);
    assert!(controller.current_handle().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_after_completion_keeps_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("done.bin");

    let connector = ScriptedConnector::new();
    connector.serve(URL, &[3u8; 300], 50);
    let controller = controller_for(connector, FileDestination::new(&path));
    let handle = controller.start(URL);

    let status = tokio::time::timeout(TEST_TIMEOUT, handle.wait()).await.unwrap();
    assert_eq!(status, TransferStatus::Completed { bytes: 300 });

    assert!(!controller.cancel(), "a finished session cannot be cancelled");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.status(), Some(TransferStatus::Completed { bytes: 300 }));
    assert_eq!(std::fs::read(&path).unwrap(), vec![3u8; 300]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_parked_between_chunks_does_not_wait_for_data() {
    let connector = ScriptedConnector::new();
    let mut feed = connector.feed(URL, None);
    let controller = SessionController::new(connector, Arc::new(MemoryDestination::new()))
        .with_config(TransferConfig::default().with_chunk_size(32));
    let memory = MemoryDestination::new();
    let destination = PausingDestination::new(memory.clone(), Arc::clone(controller.gate()));
    let handle = controller.start_to(URL, destination);

    // The write closes the gate, so the next step parks with no chunk held.
    feed.write_all(&[7u8; 32]).await.unwrap();
    wait_until(|| controller.gate().pending_len() == 1).await;
    assert_eq!(memory.len(), 32);

    // Nothing else arrives on the connection.
    assert!(controller.cancel());
    let status = tokio::time::timeout(TEST_TIMEOUT, handle.wait()).await.unwrap();

    assert_eq!(status, TransferStatus::Canceled);
    assert!(memory.is_empty(), "partial output must be removed on cancel");
    assert!(controller.is_paused());
    drop(feed);
}
