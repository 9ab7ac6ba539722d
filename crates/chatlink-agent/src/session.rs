//! Session state machine.
//!
//! ```text
//!              Opened                  active{true}
//!   Idle ───────────────► Inactive ───────────────► Active
//!    ▲                       ▲    ◄───────────────    │
//!    │                       │      active{false}     │
//!    └── Closed / violation / navigation ─────────────┘
//! ```
//!
//! [`Session::handle`] is a pure transition: it updates the state and
//! returns the side effects for the caller to carry out. Nothing here
//! touches a socket or the page.

use chatlink_core::{
    decode, display_reason, is_anomalous_close, CloseSignal, DecodeError, Packet, PacketKind,
    SessionState,
};
use chatlink_transport_client::InboundFrame;
use tracing::{debug, info, warn};

// ── Events and effects ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The connection dialed for `session_id` (resolved from `path`) is open.
    Opened { session_id: Option<String>, path: String },
    /// A data frame arrived on the open connection.
    Frame(InboundFrame),
    /// The connection closed, for whatever reason.
    Closed { code: u16, reason: String },
    /// The host page moved to `path`.
    Navigated { path: String },
    /// Capture was requested but could not be started.
    CaptureUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send this wire text on the open connection.
    Send(String),
    StartCapture,
    StopCapture,
    /// Close the connection with a specific code and reason.
    Close(CloseSignal),
    /// Close the connection without a code.
    CloseGracefully,
}

// ── Session ───────────────────────────────────────────────────────────────────

/// One page's capture-and-forward context.
#[derive(Debug, Default)]
pub struct Session {
    session_id: Option<String>,
    state: SessionState,
    last_known_path: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn last_known_path(&self) -> Option<&str> {
        self.last_known_path.as_deref()
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        match event {
            SessionEvent::Opened { session_id, path } => self.on_opened(session_id, path),
            SessionEvent::Frame(frame) => self.on_frame(frame),
            SessionEvent::Closed { code, reason } => self.on_closed(code, &reason),
            SessionEvent::Navigated { path } => self.on_navigated(path),
            SessionEvent::CaptureUnavailable => {
                if self.state.is_active() {
                    warn!("Capture unavailable; session stays inactive until re-armed");
                    self.state = SessionState::ConnectedInactive;
                }
                Vec::new()
            }
        }
    }

    fn on_opened(&mut self, session_id: Option<String>, path: String) -> Vec<Effect> {
        // Capture never survives a reconnect: the server has to re-arm it.
        self.state = SessionState::ConnectedInactive;
        self.last_known_path = Some(path);
        self.session_id = session_id;

        match Packet::encode_id(self.session_id.as_deref()) {
            Ok(wire) => {
                info!("Session {:?} connected", self.session_id);
                vec![Effect::Send(wire)]
            }
            Err(e) => {
                warn!("Could not encode id packet: {}", e);
                Vec::new()
            }
        }
    }

    fn on_frame(&mut self, frame: InboundFrame) -> Vec<Effect> {
        if !self.state.is_connected() {
            debug!("Frame ignored: session idle");
            return Vec::new();
        }

        let decoded = match frame {
            InboundFrame::Text(text) => decode(&text),
            InboundFrame::Binary(_) => Err(DecodeError::NotText),
        };
        let packet = match decoded {
            Ok(packet) => packet,
            Err(e) => {
                if let DecodeError::NotAnObject { packet_type } = &e {
                    if PacketKind::from_tag(packet_type) == PacketKind::Active {
                        warn!("'active' packet carries a non-object payload");
                    }
                }
                warn!("{}; closing with {}", e, CloseSignal::PACKET_INVALID);
                return self.terminate(CloseSignal::PACKET_INVALID);
            }
        };

        match packet.kind() {
            PacketKind::Active => match packet.should_be_active() {
                Some(true) => self.activate(),
                Some(false) => self.deactivate(),
                None => {
                    warn!(
                        "'active' packet without boolean shouldBeActive ({:?}); closing with {}",
                        packet.payload.get("shouldBeActive"),
                        CloseSignal::PROTOCOL_VIOLATED
                    );
                    self.terminate(CloseSignal::PROTOCOL_VIOLATED)
                }
            },
            _ => {
                debug!("Ignoring '{}' packet", packet.packet_type);
                Vec::new()
            }
        }
    }

    fn activate(&mut self) -> Vec<Effect> {
        if self.state.is_active() {
            debug!("Already active");
            return Vec::new();
        }
        info!("Server armed capture");
        self.state = SessionState::ConnectedActive;
        vec![Effect::StartCapture]
    }

    fn deactivate(&mut self) -> Vec<Effect> {
        if !self.state.is_active() {
            debug!("Already inactive");
            return Vec::new();
        }
        info!("Server disarmed capture");
        self.state = SessionState::ConnectedInactive;
        vec![Effect::StopCapture]
    }

    fn terminate(&mut self, signal: CloseSignal) -> Vec<Effect> {
        self.state = SessionState::Idle;
        vec![Effect::Close(signal), Effect::StopCapture]
    }

    fn on_closed(&mut self, code: u16, reason: &str) -> Vec<Effect> {
        if is_anomalous_close(code) {
            warn!("Connection closed: code={} reason={}", code, display_reason(reason));
        } else {
            info!("Connection closed (code={})", code);
        }
        self.state = SessionState::Idle;
        vec![Effect::StopCapture]
    }

    fn on_navigated(&mut self, path: String) -> Vec<Effect> {
        if self.last_known_path.as_deref() == Some(path.as_str()) {
            return Vec::new();
        }
        info!("Page navigated to {}", path);
        self.last_known_path = Some(path);
        self.state = SessionState::Idle;
        vec![Effect::CloseGracefully, Effect::StopCapture]
    }
}
