use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatLinkError {
    #[error("Configuration invalid: {reason}")]
    ConfigurationInvalid { reason: String },

    #[error("Session unresolved: {reason}")]
    SessionUnresolved { reason: String },
}

/// Inbound frame that could not be turned into a [`Packet`](crate::Packet).
///
/// Every variant is a malformed packet: the whole channel is considered
/// suspect and gets closed with [`CloseSignal::PACKET_INVALID`](crate::CloseSignal::PACKET_INVALID).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed packet: frame is not text")]
    NotText,

    #[error("Malformed packet: no separator between type and payload")]
    MissingSeparator,

    #[error("Malformed packet: payload of '{packet_type}' is not valid JSON ({reason})")]
    InvalidJson { packet_type: String, reason: String },

    #[error("Malformed packet: payload of '{packet_type}' is not a JSON object")]
    NotAnObject { packet_type: String },
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Invalid packet type {packet_type:?}: must be a non-empty token without whitespace")]
    InvalidType { packet_type: String },

    #[error("Payload of '{packet_type}' must serialize to a JSON object")]
    NotAnObject { packet_type: String },

    #[error("Payload serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection closed by peer")]
    ConnectionClosed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Chat container not found in the page")]
    ContainerMissing,

    #[error("Observer failed to attach: {reason}")]
    ObserveFailed { reason: String },

    #[error("Captured item has no author")]
    MissingAuthor,

    #[error("Captured item has no text")]
    MissingText,
}
