//! Wire packets and the line codec.
//!
//! Every frame on the control channel is one text message:
//!
//! ```text
//! <type> <json-object>
//! id      {"id":"abc123"}                      client → server
//! message {"author":"alice","text":"hi"}       client → server
//! active  {"shouldBeActive":true}              server → client
//! ```
//!
//! The type token is everything before the first whitespace; the rest must
//! parse as a JSON **object** so fields can be added later without breaking
//! older peers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{DecodeError, EncodeError};

// ── Packet types ──────────────────────────────────────────────────────────────

pub const TYPE_ID: &str = "id";
pub const TYPE_MESSAGE: &str = "message";
pub const TYPE_ACTIVE: &str = "active";

/// Known packet types. Anything else decodes fine and is ignored upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Id,
    Message,
    Active,
    Unknown,
}

impl PacketKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            TYPE_ID => Self::Id,
            TYPE_MESSAGE => Self::Message,
            TYPE_ACTIVE => Self::Active,
            _ => Self::Unknown,
        }
    }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// `id` payload: the page's chat/video id (`null` when unknown).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdPayload {
    pub id: Option<String>,
}

/// `message` payload: one captured chat entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub author: String,
    pub text: String,
}

/// `active` payload: arms or disarms capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePayload {
    #[serde(rename = "shouldBeActive")]
    pub should_be_active: bool,
}

// ── Packet ────────────────────────────────────────────────────────────────────

/// A decoded packet: type token plus JSON object payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub packet_type: String,
    pub payload: Map<String, Value>,
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        PacketKind::from_tag(&self.packet_type)
    }

    /// `shouldBeActive` of an `active` packet, if present and boolean.
    pub fn should_be_active(&self) -> Option<bool> {
        self.payload.get("shouldBeActive").and_then(Value::as_bool)
    }

    /// Wire form of an `id` packet.
    pub fn encode_id(id: Option<&str>) -> Result<String, EncodeError> {
        encode(TYPE_ID, &IdPayload { id: id.map(str::to_owned) })
    }

    /// Wire form of a `message` packet.
    pub fn encode_message(author: &str, text: &str) -> Result<String, EncodeError> {
        encode(
            TYPE_MESSAGE,
            &MessagePayload { author: author.to_owned(), text: text.to_owned() },
        )
    }

    /// Wire form of an `active` packet (server side; used by tools and tests).
    pub fn encode_active(should_be_active: bool) -> Result<String, EncodeError> {
        encode(TYPE_ACTIVE, &ActivePayload { should_be_active })
    }

    /// Re-encode this packet.
    pub fn to_wire(&self) -> Result<String, EncodeError> {
        encode(&self.packet_type, &self.payload)
    }
}

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Encode `payload` under `packet_type` as `"<type> <json>"`.
pub fn encode<P>(packet_type: &str, payload: &P) -> Result<String, EncodeError>
where
    P: Serialize + ?Sized,
{
    if packet_type.is_empty() || packet_type.chars().any(char::is_whitespace) {
        return Err(EncodeError::InvalidType { packet_type: packet_type.to_owned() });
    }
    let value = serde_json::to_value(payload)?;
    if !value.is_object() {
        return Err(EncodeError::NotAnObject { packet_type: packet_type.to_owned() });
    }
    Ok(format!("{packet_type} {value}"))
}

/// Decode one text frame into a [`Packet`].
pub fn decode(text: &str) -> Result<Packet, DecodeError> {
    let (packet_type, json) = text
        .split_once(char::is_whitespace)
        .ok_or(DecodeError::MissingSeparator)?;
    // A leading space leaves no type token at all.
    if packet_type.is_empty() {
        return Err(DecodeError::MissingSeparator);
    }

    let value: Value = serde_json::from_str(json).map_err(|e| DecodeError::InvalidJson {
        packet_type: packet_type.to_owned(),
        reason: e.to_string(),
    })?;

    match value {
        Value::Object(payload) => Ok(Packet { packet_type: packet_type.to_owned(), payload }),
        _ => Err(DecodeError::NotAnObject { packet_type: packet_type.to_owned() }),
    }
}
