//! `ConnectionManager`: at most one live connection per session.
//!
//! The retry timer calls [`ConnectionManager::try_open`] on every tick; the
//! live-handle check inside it is the only thing preventing duplicate
//! connections, so calling it unconditionally is safe.

use chatlink_capture::PageBridge;
use chatlink_core::{ChatLinkError, CloseSignal, TransportError};
use chatlink_transport_client::{ConnectionHandle, EventSender};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// What a dial was resolved against, replayed into the session on open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialTarget {
    pub session_id: String,
    pub path: String,
}

/// Result of one [`ConnectionManager::try_open`] call.
#[derive(Debug)]
pub enum OpenOutcome {
    /// A handle is already connecting or open.
    AlreadyLive,
    /// The page could not be resolved; try again next tick.
    Skipped(ChatLinkError),
    /// A new handle is dialing.
    Dialed { connection_id: u64 },
}

pub struct ConnectionManager {
    url: String,
    events_tx: EventSender,
    handle: Option<ConnectionHandle>,
    target: Option<DialTarget>,
    /// Task of the most recently closed handle, still flushing its close frame.
    closing: Option<JoinHandle<()>>,
    next_id: u64,
}

impl ConnectionManager {
    pub fn new(url: impl Into<String>, events_tx: EventSender) -> Self {
        Self { url: url.into(), events_tx, handle: None, target: None, closing: None, next_id: 0 }
    }

    /// Id of the current handle, if any.
    pub fn current_id(&self) -> Option<u64> {
        self.handle.as_ref().map(ConnectionHandle::id)
    }

    pub fn is_current(&self, connection_id: u64) -> bool {
        self.current_id() == Some(connection_id)
    }

    /// Dial a new connection unless one is live or the page is unresolvable.
    pub fn try_open(&mut self, page: &dyn PageBridge) -> OpenOutcome {
        if self.handle.as_ref().is_some_and(|h| h.phase().is_live()) {
            return OpenOutcome::AlreadyLive;
        }

        let path = page.current_navigation_path();
        let Some(session_id) = page.current_session_id() else {
            info!("No chat id on {}; not connecting", path);
            return OpenOutcome::Skipped(ChatLinkError::SessionUnresolved {
                reason: format!("no chat id in {}", path),
            });
        };
        if page.locate_capture_container().is_none() {
            info!("Chat container not found on {}; not connecting", path);
            return OpenOutcome::Skipped(ChatLinkError::SessionUnresolved {
                reason: "chat container not found".to_owned(),
            });
        }

        self.next_id += 1;
        let connection_id = self.next_id;
        self.handle = Some(ConnectionHandle::dial(connection_id, &self.url, self.events_tx.clone()));
        self.target = Some(DialTarget { session_id, path });
        OpenOutcome::Dialed { connection_id }
    }

    /// Mark the current handle open. Returns what it was dialed for.
    pub fn on_open(&mut self, connection_id: u64) -> Option<DialTarget> {
        let handle = self.handle.as_mut().filter(|h| h.id() == connection_id)?;
        handle.mark_open();
        self.target.clone()
    }

    /// Forget the current handle after its task reported `Closed`.
    pub fn on_closed(&mut self, connection_id: u64) {
        if self.is_current(connection_id) {
            self.handle = None;
            self.target = None;
        }
    }

    /// Queue `wire` on the open connection.
    pub fn send(&self, wire: String) -> Result<(), TransportError> {
        match &self.handle {
            Some(handle) => handle.send_text(wire),
            None => Err(TransportError::NotConnected),
        }
    }

    /// Close gracefully (no code). Returns whether there was anything to close.
    pub fn try_close(&mut self) -> bool {
        self.take_and_close(None)
    }

    /// Close with a specific code and reason.
    pub fn close_with(&mut self, signal: CloseSignal) -> bool {
        self.take_and_close(Some(signal))
    }

    fn take_and_close(&mut self, signal: Option<CloseSignal>) -> bool {
        self.target = None;
        let Some(handle) = self.handle.take() else {
            debug!("Close requested with no connection");
            return false;
        };
        match signal {
            Some(signal) => info!("Connection[{}] closing with {}", handle.id(), signal),
            None => info!("Connection[{}] closing", handle.id()),
        }
        self.closing = Some(handle.close(signal));
        true
    }

    /// Task of the last locally closed connection, if not yet collected.
    pub fn take_closing(&mut self) -> Option<JoinHandle<()>> {
        self.closing.take()
    }
}
