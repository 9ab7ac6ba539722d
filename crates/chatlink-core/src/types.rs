// MARK: - SessionState

/// Capture-session state of one page.
///
/// `ConnectedActive` is only reachable while a connection is open; every
/// close drops the session back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    ConnectedInactive,
    ConnectedActive,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::ConnectedActive)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ConnectedInactive => write!(f, "connected (inactive)"),
            Self::ConnectedActive => write!(f, "connected (active)"),
        }
    }
}

// MARK: - ConnectionPhase

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Connecting,
    Open,
    Closed,
}

impl ConnectionPhase {
    /// A handle in this phase blocks any new dial attempt.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

// MARK: - CloseSignal

/// Close code 1000: normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code 1005: no status received (close frame without a code).
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Close code 1006: connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Shown in logs when a peer closes without a reason.
pub const NO_REASON: &str = "(no reason)";

/// Close code and reason the client sends when it terminates the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseSignal {
    pub code: u16,
    pub reason: &'static str,
}

impl CloseSignal {
    /// The peer sent a frame the codec could not decode.
    pub const PACKET_INVALID: Self = Self { code: 4001, reason: "packet invalid" };
    /// The peer sent a well-formed packet that breaks the command contract.
    pub const PROTOCOL_VIOLATED: Self = Self { code: 4002, reason: "protocol violated" };
}

impl std::fmt::Display for CloseSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} \"{}\"", self.code, self.reason)
    }
}

/// Whether a close with this code deserves a warning in the logs.
pub fn is_anomalous_close(code: u16) -> bool {
    !matches!(code, CLOSE_NORMAL | CLOSE_NO_STATUS)
}

/// Reason text for logging, substituting [`NO_REASON`] for an empty one.
pub fn display_reason(reason: &str) -> &str {
    if reason.is_empty() { NO_REASON } else { reason }
}

// MARK: - ChatEntry

/// One validated chat entry, ready to forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub author: String,
    pub text: String,
}

impl ChatEntry {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self { author: author.into(), text: text.into() }
    }
}

// MARK: - Session id

/// Derive the chat/video id from a page path such as `/watch?v=abc123`.
///
/// Looks at the `v` query parameter first, then a `/live/<id>` path
/// segment. Returns `None` when neither is present.
pub fn session_id_from_path(path: &str) -> Option<String> {
    let path = path.split('#').next().unwrap_or_default();
    let (route, query) = match path.split_once('?') {
        Some((route, query)) => (route, query),
        None => (path, ""),
    };

    let from_query = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, value)| *key == "v" && !value.is_empty())
        .map(|(_, value)| value.to_owned());
    if from_query.is_some() {
        return from_query;
    }

    route
        .strip_prefix("/live/")
        .and_then(|rest| rest.split('/').next())
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
}
