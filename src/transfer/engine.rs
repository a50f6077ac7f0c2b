//! Streaming copy loop, split into gated steps
//!
//! Every scheduled run of a [`TransferEngine`] performs exactly one step and,
//! unless the transfer reached a terminal state, re-submits the engine
//! through its [`GatedScheduler`]. On every chunk boundary the step checks,
//! in this order:
//!
//! 1. the cancel token - discard partial output and finish as `Canceled`
//! 2. the pause gate - keep the chunk that was already read and re-submit,
//!    which parks the engine on the gate until it reopens
//! 3. otherwise write the chunk and move on
//!
//! There is no sleeping or polling while paused: a parked step runs again
//! only when the gate releases it (resume) or flushes it (cancel, supersede).

use std::sync::Arc;
use std::time::Instant;

use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::config::TransferConfig;
use super::progress::ProgressState;
use super::{SessionEvent, SessionId, TransferError, TransferEvent, TransferPhase, TransferStatus};
use crate::cancel::CancelToken;
use crate::connector::{Connection, Connector};
use crate::dispatch::{GatedScheduler, Task};
use crate::metrics;
use crate::output::{Destination, Sink};

/// Receives the events of a transfer.
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    fn emit(&self, event: SessionEvent);
}

impl<F> EventSink for F
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn emit(&self, event: SessionEvent) {
        self(event);
    }
}

/// Observer side of a transfer: its phase and, eventually, its outcome.
#[derive(Debug, Clone)]
pub struct TransferHandle {
    session: SessionId,
    phase: watch::Receiver<TransferPhase>,
    status: watch::Receiver<Option<TransferStatus>>,
}

impl TransferHandle {
    /// Session this handle observes.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> TransferPhase {
        *self.phase.borrow()
    }

    /// Terminal status, if the transfer already finished.
    pub fn status(&self) -> Option<TransferStatus> {
        self.status.borrow().clone()
    }

    /// Wait for the terminal status.
    ///
    /// If the engine is dropped before finishing (for instance because the
    /// runtime shut down while it was parked), this reports a failure rather
    /// than waiting forever.
    pub async fn wait(&self) -> TransferStatus {
        let mut status = self.status.clone();
        let finished = status
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|s| s.clone());
        finished.unwrap_or_else(|| TransferStatus::Failed {
            message: "transfer abandoned before reaching a terminal state".to_string(),
            status_code: None,
        })
    }
}

/// State carried from one streaming step to the next.
struct Stream {
    connection: Connection,
    sink: Box<dyn Sink>,
    buffer: Vec<u8>,
    /// Length of a chunk that was read but not yet written.
    held: Option<usize>,
    progress: ProgressState,
    parked: bool,
}

enum State {
    Idle,
    Streaming(Box<Stream>),
    Done,
}

enum Step {
    Continue(State),
    Finish(TransferStatus),
}

/// One transfer attempt: connect, copy chunk by chunk, report.
pub struct TransferEngine {
    session: SessionId,
    url: String,
    config: TransferConfig,
    connector: Arc<dyn Connector>,
    destination: Arc<dyn Destination>,
    scheduler: GatedScheduler,
    cancel: CancelToken,
    events: Arc<dyn EventSink>,
    predecessor: Option<TransferHandle>,
    phase: watch::Sender<TransferPhase>,
    status: watch::Sender<Option<TransferStatus>>,
    started_at: Option<Instant>,
    state: State,
}

impl TransferEngine {
    /// Prepare a transfer of `url` into `destination`.
    pub fn new(
        session: SessionId,
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        destination: Arc<dyn Destination>,
        scheduler: GatedScheduler,
    ) -> Self {
        let (phase, _) = watch::channel(TransferPhase::Idle);
        let (status, _) = watch::channel(None);
        Self {
            session,
            url: url.into(),
            config: TransferConfig::default(),
            connector,
            destination,
            scheduler,
            cancel: CancelToken::new(),
            events: Arc::new(|_: SessionEvent| {}),
            predecessor: None,
            phase,
            status,
            started_at: None,
            state: State::Idle,
        }
    }

    /// Override chunk size and progress cadence.
    pub fn with_config(mut self, config: TransferConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a cancel token with the caller.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Deliver events to `events`.
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Do not touch the destination before `predecessor` has finished.
    pub fn after(mut self, predecessor: TransferHandle) -> Self {
        self.predecessor = Some(predecessor);
        self
    }

    /// Handle observing this transfer.
    pub fn handle(&self) -> TransferHandle {
        TransferHandle {
            session: self.session,
            phase: self.phase.subscribe(),
            status: self.status.subscribe(),
        }
    }

    /// Schedule the first step and return immediately.
    pub fn start(self) -> TransferHandle {
        let handle = self.handle();
        debug!(session = %self.session, url = %self.url, "transfer scheduled");
        self.resubmit();
        handle
    }

    fn into_task(self) -> Task {
        Box::pin(self.run_step())
    }

    fn resubmit(self) {
        let scheduler = self.scheduler.clone();
        let cancel = self.cancel.clone();
        scheduler.dispatch_cancellable(self.into_task(), &cancel);
    }

    /// Perform one step, then re-submit or finish.
    async fn run_step(mut self) {
        loop {
            let next = match std::mem::replace(&mut self.state, State::Done) {
                State::Idle => self.begin().await,
                State::Streaming(stream) => self.stream_chunk(stream).await,
                State::Done => return,
            };

            match next {
                Step::Continue(state) => {
                    self.state = state;
                    // A cancelled transfer must not park; its next step ends it.
                    if self.cancel.is_cancelled() {
                        continue;
                    }
                    self.resubmit();
                    return;
                }
                Step::Finish(status) => {
                    self.finish(status);
                    return;
                }
            }
        }
    }

    async fn begin(&mut self) -> Step {
        if let Some(predecessor) = self.predecessor.take() {
            // Both attempts write the same destination; never overlap them.
            let previous = predecessor.wait().await;
            debug!(
                session = %self.session,
                predecessor = %predecessor.session(),
                status = %previous,
                "predecessor finished"
            );
        }

        if self.cancel.is_cancelled() {
            return self.cancelled().await;
        }
        if self.scheduler.gate().is_paused() {
            return Step::Continue(State::Idle);
        }

        self.set_phase(TransferPhase::Connecting);
        self.started_at = Some(Instant::now());
        metrics::record_transfer_started();
        info!(session = %self.session, url = %self.url, "connecting");

        let connection = match self.connector.connect(&self.url).await {
            Ok(connection) => connection,
            Err(e) => return Step::Finish(TransferStatus::failed(&TransferError::from(e))),
        };

        let sink = match self.destination.open().await {
            Ok(sink) => sink,
            Err(e) => return Step::Finish(TransferStatus::failed(&TransferError::from(e))),
        };

        let total = connection.content_length;
        self.set_phase(TransferPhase::Streaming);
        self.emit(TransferEvent::Started {
            url: self.url.clone(),
            total,
        });

        Step::Continue(State::Streaming(Box::new(Stream {
            connection,
            sink,
            buffer: vec![0u8; self.config.chunk_size],
            held: None,
            progress: ProgressState::new(total, self.config.progress_step),
            parked: false,
        })))
    }

    async fn stream_chunk(&mut self, mut stream: Box<Stream>) -> Step {
        // Never read once cancelled; the connection may be stalled.
        if self.cancel.is_cancelled() {
            drop(stream);
            return self.cancelled().await;
        }

        let read = match stream.held.take() {
            Some(len) => Ok(len),
            None => stream.connection.body.read(&mut stream.buffer).await,
        };

        if self.cancel.is_cancelled() {
            // Closes the connection and the sink before the output goes.
            drop(stream);
            return self.cancelled().await;
        }

        let len = match read {
            Ok(0) => return self.completed(stream).await,
            Ok(len) => len,
            Err(e) => return self.failed(stream, TransferError::Read(e.to_string())).await,
        };

        if self.scheduler.gate().is_paused() {
            stream.held = Some(len);
            if !stream.parked {
                stream.parked = true;
                debug!(
                    session = %self.session,
                    bytes = stream.progress.bytes_written,
                    "paused, parking transfer"
                );
                if let Err(e) = stream.sink.flush().await {
                    return Step::Finish(TransferStatus::failed(&TransferError::from(e)));
                }
            }
            return Step::Continue(State::Streaming(stream));
        }

        if stream.parked {
            stream.parked = false;
            debug!(session = %self.session, bytes = stream.progress.bytes_written, "resumed");
        }

        if let Err(e) = stream.sink.write_chunk(&stream.buffer[..len]).await {
            return self.failed(stream, TransferError::from(e)).await;
        }
        stream.progress.update(len as u64);
        metrics::record_bytes_written(len as u64);

        if stream.progress.should_emit_update() {
            self.emit_progress(&mut stream.progress);
        }

        Step::Continue(State::Streaming(stream))
    }

    async fn completed(&mut self, mut stream: Box<Stream>) -> Step {
        if let Err(e) = stream.sink.finish().await {
            return Step::Finish(TransferStatus::failed(&TransferError::from(e)));
        }
        if stream.progress.bytes_written != stream.progress.last_reported {
            self.emit_progress(&mut stream.progress);
        }
        debug!(session = %self.session, "{}", stream.progress.format_progress());
        Step::Finish(TransferStatus::Completed {
            bytes: stream.progress.bytes_written,
        })
    }

    /// Partial output stays on failure, so whatever the sink buffered goes
    /// out before the stream is dropped.
    async fn failed(&mut self, mut stream: Box<Stream>, error: TransferError) -> Step {
        if let Err(e) = stream.sink.flush().await {
            warn!(session = %self.session, error = %e, "failed to flush partial output");
        }
        Step::Finish(TransferStatus::failed(&error))
    }

    async fn cancelled(&mut self) -> Step {
        if let Err(e) = self.destination.discard().await {
            warn!(session = %self.session, error = %e, "failed to discard partial output");
        }
        Step::Finish(TransferStatus::Canceled)
    }

    fn finish(mut self, status: TransferStatus) {
        self.state = State::Done;
        self.set_phase(TransferPhase::from(&status));

        let elapsed = self.started_at.map(|t| t.elapsed());
        match &status {
            TransferStatus::Completed { bytes } => {
                info!(session = %self.session, url = %self.url, bytes, ?elapsed, "download completed");
            }
            TransferStatus::Canceled => {
                info!(session = %self.session, url = %self.url, "download canceled");
            }
            TransferStatus::Failed { message, .. } => {
                error!(session = %self.session, url = %self.url, error = %message, "download failed");
            }
        }
        metrics::record_transfer_finished(&status, elapsed);

        self.emit(TransferEvent::Finished(status.clone()));
        self.status.send_replace(Some(status));
    }

    fn emit_progress(&self, progress: &mut ProgressState) {
        self.emit(TransferEvent::Progress {
            bytes: progress.bytes_written,
            total: progress.total_expected,
        });
        progress.mark_emitted();
    }

    fn emit(&self, event: TransferEvent) {
        self.events.emit(SessionEvent {
            session: self.session,
            event,
        });
    }

    fn set_phase(&self, phase: TransferPhase) {
        self.phase.send_replace(phase);
    }
}
