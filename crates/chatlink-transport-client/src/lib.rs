//! chatlink-transport-client: client side of the ChatLink control channel.
//!
//! One WebSocket to the local chat server carries every packet in both
//! directions. This crate owns the socket; packet semantics live in
//! `chatlink-core` and the session logic in `chatlink-agent`.
//!
//! # Architecture
//!
//! ```text
//! chatlink-agent (single task)                  connection task (per dial)
//! ────────────────────────────                  ─────────────────────────────
//! ConnectionHandle::send_text ── Outgoing ────► WebSocket sink ───► server
//! ConnectionHandle::close     ── Outgoing ────► close frame
//! events_rx ◄──────────────── ConnectionEvent ◄ WebSocket stream ◄── server
//! ```
//!
//! Every event is tagged with the id of the handle that produced it so the
//! consumer can drop late events from a handle it already discarded.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chatlink_transport_client::{ConnectionEventKind, ConnectionHandle};
//! use tokio::sync::mpsc;
//!
//! # async fn example() {
//! let (events_tx, mut events_rx) = mpsc::unbounded_channel();
//! let mut handle = ConnectionHandle::dial(1, "ws://127.0.0.1:31418", events_tx);
//! while let Some(event) = events_rx.recv().await {
//!     if let ConnectionEventKind::Open = event.kind {
//!         handle.mark_open();
//!         handle.send_text(r#"id {"id":"abc123"}"#.to_owned()).unwrap();
//!     }
//! }
//! # }
//! ```

pub mod connection;

pub use connection::{ConnectionEvent, ConnectionEventKind, ConnectionHandle, EventSender, InboundFrame};

// ── Endpoint helpers ──────────────────────────────────────────────────────────

pub const SERVER_HOST: &str = "127.0.0.1";
pub const SERVER_PORT: u16 = 31418;

/// `ws://` URL of a chat server listening on `host:port`.
#[inline]
pub fn server_url(host: &str, port: u16) -> String {
    format!("ws://{}:{}", host, port)
}
