//! Switch-to-latest transfer sessions
//!
//! [`SessionController`] owns the pause gate and exposes the four controls of
//! a download screen: start, pause, resume and cancel. Every `start` opens a
//! new session with its own [`CancelToken`] and a larger [`SessionId`]; the
//! previous session is cancelled and its events stop reaching subscribers.
//!
//! Sessions that share a destination never overlap: a new transfer waits for
//! its predecessor's terminal status before it opens the output, so a
//! cancelled predecessor deleting its partial file cannot remove the new one.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::cancel::CancelToken;
use crate::connector::Connector;
use crate::dispatch::{Executor, GatedScheduler, PauseGate, SharedGate, TokioExecutor};
use crate::output::Destination;
use crate::transfer::{
    EventSink, SessionEvent, SessionId, TransferConfig, TransferEngine, TransferHandle,
};

struct Route {
    current: SessionId,
    subscriber: Option<mpsc::UnboundedSender<SessionEvent>>,
}

/// Forwards events of the current session to the subscriber, if any.
struct EventRouter {
    route: Mutex<Route>,
}

impl EventRouter {
    fn new() -> Self {
        Self {
            route: Mutex::new(Route {
                current: SessionId(0),
                subscriber: None,
            }),
        }
    }

    fn switch_to(&self, session: SessionId) {
        self.route.lock().current = session;
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.route.lock().subscriber = Some(tx);
        rx
    }
}

impl EventSink for EventRouter {
    fn emit(&self, event: SessionEvent) {
        let mut route = self.route.lock();
        if event.session != route.current {
            trace!(session = %event.session, current = %route.current, "dropping stale event");
            return;
        }
        let closed = match &route.subscriber {
            Some(tx) => tx.send(event).is_err(),
            None => false,
        };
        if closed {
            route.subscriber = None;
        }
    }
}

#[derive(Default)]
struct Active {
    generation: u64,
    cancel: Option<CancelToken>,
    handle: Option<TransferHandle>,
}

/// Drives one transfer at a time with pause, resume and cancel controls.
///
/// All controls return immediately and may be called from any thread.
pub struct SessionController {
    connector: Arc<dyn Connector>,
    destination: Arc<dyn Destination>,
    config: TransferConfig,
    scheduler: GatedScheduler,
    router: Arc<EventRouter>,
    active: Mutex<Active>,
}

impl SessionController {
    /// Controller writing to `destination`, running on the current Tokio
    /// runtime.
    ///
    /// # Panics
    /// Panics when called outside of a Tokio runtime.
    pub fn new(connector: Arc<dyn Connector>, destination: Arc<dyn Destination>) -> Self {
        Self::with_executor(connector, destination, Arc::new(TokioExecutor::current()))
    }

    /// Controller whose steps run on `executor`.
    pub fn with_executor(
        connector: Arc<dyn Connector>,
        destination: Arc<dyn Destination>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            connector,
            destination,
            config: TransferConfig::default(),
            scheduler: GatedScheduler::new(PauseGate::shared(), executor),
            router: Arc::new(EventRouter::new()),
            active: Mutex::new(Active::default()),
        }
    }

    /// Set chunk size and progress cadence for future sessions.
    pub fn with_config(mut self, config: TransferConfig) -> Self {
        self.config = config;
        self
    }

    /// Start downloading `url` into the default destination, superseding
    /// any running session.
    pub fn start(&self, url: &str) -> TransferHandle {
        self.start_to(url, Arc::clone(&self.destination))
    }

    /// Start downloading `url` into `destination`, superseding any running
    /// session.
    pub fn start_to(&self, url: &str, destination: Arc<dyn Destination>) -> TransferHandle {
        let handle = {
            let mut active = self.active.lock();
            active.generation += 1;
            let session = SessionId(active.generation);
            // Switch first so the predecessor's cancellation is never surfaced.
            self.router.switch_to(session);
            if let Some(previous) = active.cancel.take() {
                previous.cancel();
            }

            let cancel = CancelToken::new();
            let events: Arc<dyn EventSink> = self.router.clone();
            let mut engine = TransferEngine::new(
                session,
                url,
                Arc::clone(&self.connector),
                destination,
                self.scheduler.clone(),
            )
            .with_config(self.config.clone())
            .with_cancel_token(cancel.clone())
            .with_events(events);
            if let Some(previous) = active.handle.take() {
                engine = engine.after(previous);
            }

            info!(session = %session, url, paused = self.is_paused(), "starting transfer");
            let handle = engine.start();
            active.cancel = Some(cancel);
            active.handle = Some(handle.clone());
            handle
        };

        // A parked predecessor must run once more to see its cancellation.
        self.scheduler.gate().flush();
        handle
    }

    /// Pause at the next chunk boundary.
    pub fn pause(&self) {
        debug!("pause requested");
        self.scheduler.gate().pause();
    }

    /// Resume parked work. Returns whether this call reopened the gate.
    pub fn resume(&self) -> bool {
        debug!("resume requested");
        self.scheduler.gate().resume()
    }

    /// Cancel the current session, even while paused.
    ///
    /// Returns `false` when there is no session, it was already cancelled or
    /// it already reached a terminal status.
    pub fn cancel(&self) -> bool {
        let cancelled = {
            let active = self.active.lock();
            let finished = active
                .handle
                .as_ref()
                .is_some_and(|handle| handle.status().is_some());
            match &active.cancel {
                Some(token) if !finished => token.cancel(),
                _ => false,
            }
        };
        if cancelled {
            debug!(session = %self.current_session(), "cancel requested");
            self.scheduler.gate().flush();
        }
        cancelled
    }

    /// Receive events of the current session and of every later one.
    ///
    /// Only one subscriber is served; subscribing again replaces it.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.router.subscribe()
    }

    /// Most recently started session, `SessionId(0)` before the first start.
    pub fn current_session(&self) -> SessionId {
        SessionId(self.active.lock().generation)
    }

    /// Handle of the most recently started session.
    pub fn current_handle(&self) -> Option<TransferHandle> {
        self.active.lock().handle.clone()
    }

    /// Whether the gate is closed.
    pub fn is_paused(&self) -> bool {
        self.scheduler.gate().is_paused()
    }

    /// The pause gate shared by every session of this controller.
    pub fn gate(&self) -> &SharedGate {
        self.scheduler.gate()
    }
}
