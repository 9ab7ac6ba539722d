//! WebSocket connection handle (client role).
//!
//! # Lifecycle
//!
//! ```text
//! 1. ConnectionHandle::dial(id, url, events_tx)     phase = Connecting
//!       └─ spawns the connection task
//! 2. task emits Open                                 consumer calls mark_open()
//! 3. handle.send_text(wire)                          phase = Open
//! 4. task emits Frame / Error / Closed
//! 5. handle.close(signal)                            phase = Closed, handle consumed
//! ```
//!
//! The task always finishes with exactly one `Closed` event unless the
//! consumer closed the handle itself.

use anyhow::Context;
use chatlink_core::{CloseSignal, ConnectionPhase, TransportError, CLOSE_ABNORMAL, CLOSE_NO_STATUS};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

// ── Events ────────────────────────────────────────────────────────────────────

/// A data frame received from the server, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEventKind {
    /// Handshake finished; the socket is writable.
    Open,
    /// A data frame arrived.
    Frame(InboundFrame),
    /// Transport failure. Always followed by `Closed`.
    Error(String),
    /// The socket is gone. `code` follows RFC 6455 (1005 = no code, 1006 = dropped).
    Closed { code: u16, reason: String },
}

/// An event produced by a connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub connection_id: u64,
    pub kind: ConnectionEventKind,
}

pub type EventSender = mpsc::UnboundedSender<ConnectionEvent>;

/// Outgoing command from the handle to its connection task.
#[derive(Debug)]
enum Outgoing {
    Text(String),
    /// `None` closes without a status code.
    Close(Option<CloseSignal>),
}

// ── ConnectionHandle ──────────────────────────────────────────────────────────

/// One dial attempt to the chat server.
///
/// Not `Clone`: the connection manager is the only owner.
pub struct ConnectionHandle {
    id: u64,
    phase: ConnectionPhase,
    out_tx: mpsc::UnboundedSender<Outgoing>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Start dialing `url` in a background task. Must be called inside a tokio runtime.
    pub fn dial(id: u64, url: &str, events: EventSender) -> Self {
        let (out_tx, out_rx) = mpsc::unbounded_channel::<Outgoing>();
        info!("Connection[{}] dialing {}", id, url);
        let task = tokio::spawn(run_connection(id, url.to_owned(), out_rx, events));
        Self { id, phase: ConnectionPhase::Connecting, out_tx, task }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Record that the task reported `Open`.
    pub fn mark_open(&mut self) {
        self.phase = ConnectionPhase::Open;
    }

    /// Queue one text frame. Fails unless the handle is open.
    pub fn send_text(&self, text: String) -> Result<(), TransportError> {
        if self.phase != ConnectionPhase::Open {
            return Err(TransportError::NotConnected);
        }
        self.out_tx
            .send(Outgoing::Text(text))
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Close the connection, with `signal` as code and reason or gracefully
    /// without a code when `None`. A handle still connecting is aborted.
    ///
    /// Returns the connection task so the caller can wait for the close
    /// frame to go out.
    pub fn close(mut self, signal: Option<CloseSignal>) -> JoinHandle<()> {
        match self.phase {
            ConnectionPhase::Connecting => {
                debug!("Connection[{}] aborted while connecting", self.id);
                self.task.abort();
            }
            ConnectionPhase::Open => {
                if self.out_tx.send(Outgoing::Close(signal)).is_err() {
                    debug!("Connection[{}] task already gone", self.id);
                }
            }
            ConnectionPhase::Closed => {}
        }
        self.phase = ConnectionPhase::Closed;
        self.task
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .finish()
    }
}

// ── Connection task ───────────────────────────────────────────────────────────

async fn run_connection(
    id: u64,
    url: String,
    mut out_rx: mpsc::UnboundedReceiver<Outgoing>,
    events: EventSender,
) {
    let emit = |kind: ConnectionEventKind| {
        // The receiver only goes away when the agent shuts down.
        let _ = events.send(ConnectionEvent { connection_id: id, kind });
    };

    let ws = match tokio_tungstenite::connect_async(url.as_str())
        .await
        .with_context(|| format!("WebSocket connect to {}", url))
    {
        Ok((ws, _response)) => ws,
        Err(e) => {
            emit(ConnectionEventKind::Error(format!("{:#}", e)));
            emit(ConnectionEventKind::Closed { code: CLOSE_ABNORMAL, reason: String::new() });
            return;
        }
    };
    let (mut sink, mut stream) = ws.split();
    emit(ConnectionEventKind::Open);

    loop {
        tokio::select! {
            // Frame from the server
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    emit(ConnectionEventKind::Frame(InboundFrame::Text(text)));
                }
                Some(Ok(Message::Binary(data))) => {
                    emit(ConnectionEventKind::Frame(InboundFrame::Binary(data)));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    // Pings are answered by tungstenite on the next write
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|cf| (u16::from(cf.code), cf.reason.to_string()))
                        .unwrap_or((CLOSE_NO_STATUS, String::new()));
                    emit(ConnectionEventKind::Closed { code, reason });
                    return;
                }
                Some(Err(e)) => {
                    emit(ConnectionEventKind::Error(format!("WebSocket read error: {}", e)));
                    emit(ConnectionEventKind::Closed { code: CLOSE_ABNORMAL, reason: String::new() });
                    return;
                }
                None => {
                    emit(ConnectionEventKind::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: "stream ended".to_owned(),
                    });
                    return;
                }
            },

            // Command from the handle
            out = out_rx.recv() => match out {
                Some(Outgoing::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        emit(ConnectionEventKind::Error(format!("WebSocket send failed: {}", e)));
                        emit(ConnectionEventKind::Closed { code: CLOSE_ABNORMAL, reason: String::new() });
                        return;
                    }
                }
                Some(Outgoing::Close(signal)) => {
                    let frame = signal.map(|s| CloseFrame {
                        code: CloseCode::from(s.code),
                        reason: s.reason.into(),
                    });
                    if let Err(e) = sink.send(Message::Close(frame)).await {
                        warn!("Connection[{}] close frame not sent: {}", id, e);
                    }
                    let _ = sink.close().await;
                    debug!("Connection[{}] closed locally", id);
                    return;
                }
                None => {
                    // Handle dropped without an explicit close
                    let _ = sink.close().await;
                    return;
                }
            }
        }
    }
}
