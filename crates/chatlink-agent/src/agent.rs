//! `Agent`: one page's session, driven from a single task.
//!
//! ```text
//! retry ticker ───────► try_open ─────────► ConnectionManager ──► connection task
//! connection events ──► Session::handle ──► effects ──┬─► ConnectionManager (send / close)
//! navigation signal ──► Session::handle ──────────────┤
//!                                                     └─► CaptureCoordinator (start / stop)
//! captured items ─────► CaptureCoordinator::relay ──► ConnectionManager::send
//! ```
//!
//! Every input is handled to completion before the next one is polled, so
//! no state here is shared or locked.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use chatlink_capture::{CaptureCoordinator, CaptureObserver, CapturedItem, PageBridge};
use chatlink_core::{AgentConfig, SessionState, CLOSE_NORMAL};
use chatlink_transport_client::{ConnectionEvent, ConnectionEventKind};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::manager::{ConnectionManager, OpenOutcome};
use crate::session::{Effect, Session, SessionEvent};

/// How long shutdown waits for the last close frame to go out.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

// ── Status ────────────────────────────────────────────────────────────────────

/// Point-in-time view of an agent, for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub session_id: Option<String>,
    pub connection_id: Option<u64>,
    pub capturing: bool,
    pub messages_relayed: u64,
}

// ── Agent ─────────────────────────────────────────────────────────────────────

pub struct Agent<P, O> {
    config: AgentConfig,
    page: P,
    session: Session,
    manager: ConnectionManager,
    coordinator: CaptureCoordinator<O>,
    events_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    items_rx: mpsc::UnboundedReceiver<CapturedItem>,
}

impl<P: PageBridge, O: CaptureObserver> Agent<P, O> {
    /// A fresh, independently owned session for one page.
    pub fn new(config: AgentConfig, page: P, observer: O) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (items_tx, items_rx) = mpsc::unbounded_channel();
        let manager = ConnectionManager::new(config.server_url.clone(), events_tx);
        Self {
            config,
            page,
            session: Session::new(),
            manager,
            coordinator: CaptureCoordinator::new(observer, items_tx),
            events_rx,
            items_rx,
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.session.state(),
            session_id: self.session.session_id().map(str::to_owned),
            connection_id: self.manager.current_id(),
            capturing: self.coordinator.is_observing(),
            messages_relayed: self.coordinator.relayed(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn observer(&self) -> &O {
        self.coordinator.observer()
    }

    // ── Inputs ────────────────────────────────────────────────────────────────

    /// Retry tick: dial if nothing is live.
    pub fn tick(&mut self) -> OpenOutcome {
        let outcome = self.manager.try_open(&self.page);
        if let OpenOutcome::Skipped(reason) = &outcome {
            debug!("Connection attempt skipped: {}", reason);
        }
        outcome
    }

    pub fn handle_connection_event(&mut self, event: ConnectionEvent) {
        let id = event.connection_id;
        if !self.manager.is_current(id) {
            debug!("Connection[{}] stale event dropped: {:?}", id, event.kind);
            return;
        }

        let effects = match event.kind {
            ConnectionEventKind::Open => {
                let Some(target) = self.manager.on_open(id) else { return };
                info!("Connection[{}] open (session={})", id, target.session_id);
                self.session.handle(SessionEvent::Opened {
                    session_id: Some(target.session_id),
                    path: target.path,
                })
            }
            ConnectionEventKind::Frame(frame) => self.session.handle(SessionEvent::Frame(frame)),
            ConnectionEventKind::Error(reason) => {
                warn!("Connection[{}] transport error: {}", id, reason);
                return;
            }
            ConnectionEventKind::Closed { code, reason } => {
                self.manager.on_closed(id);
                self.session.handle(SessionEvent::Closed { code, reason })
            }
        };
        self.apply(effects);
    }

    /// The host page moved to `path`.
    pub fn handle_navigation(&mut self, path: String) {
        let effects = self.session.handle(SessionEvent::Navigated { path });
        self.apply(effects);
    }

    /// The capture subsystem reported a new chat entry.
    pub fn handle_captured(&mut self, item: CapturedItem) {
        let Some(wire) = self.coordinator.relay(self.session.is_active(), item) else { return };
        match self.manager.send(wire) {
            Ok(()) => self.coordinator.record_sent(),
            Err(e) => warn!("Chat entry not forwarded: {}", e),
        }
    }

    /// Close gracefully and stop capture.
    pub fn shutdown(&mut self) {
        if self.session.state().is_connected() {
            let effects = self.session.handle(SessionEvent::Closed {
                code: CLOSE_NORMAL,
                reason: "agent shutting down".to_owned(),
            });
            self.apply(effects);
        }
        self.coordinator.stop();
        self.manager.try_close();
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(wire) => {
                    if let Err(e) = self.manager.send(wire) {
                        warn!("Packet not sent: {}", e);
                    }
                }
                Effect::StartCapture => {
                    if self.coordinator.start(&self.page).is_err() {
                        self.session.handle(SessionEvent::CaptureUnavailable);
                    }
                }
                Effect::StopCapture => self.coordinator.stop(),
                Effect::Close(signal) => {
                    self.manager.close_with(signal);
                }
                Effect::CloseGracefully => {
                    self.manager.try_close();
                }
            }
        }
    }

    // ── Event loop ────────────────────────────────────────────────────────────

    /// Run until `shutdown` resolves or the navigation signal goes away.
    pub async fn run<F>(mut self, mut navigation: mpsc::UnboundedReceiver<String>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut retry = tokio::time::interval(self.config.retry_interval());
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Agent running: server={} retry={}ms",
            self.config.server_url, self.config.retry_interval_ms
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }

                _ = retry.tick() => {
                    self.tick();
                }

                Some(event) = self.events_rx.recv() => {
                    self.handle_connection_event(event);
                }

                Some(item) = self.items_rx.recv() => {
                    self.handle_captured(item);
                }

                maybe_path = navigation.recv() => match maybe_path {
                    Some(path) => self.handle_navigation(path),
                    None => {
                        info!("Navigation signal closed");
                        break;
                    }
                },
            }
        }

        self.shutdown();
        if let Some(task) = self.manager.take_closing() {
            if tokio::time::timeout(CLOSE_GRACE, task).await.is_err() {
                debug!("Close frame not flushed within {:?}", CLOSE_GRACE);
            }
        }
        info!("Agent stopped ({:?})", self.status());
        Ok(())
    }
}
