pub mod config;
pub mod errors;
pub mod packet;
pub mod types;

pub use config::AgentConfig;
pub use errors::{CaptureError, ChatLinkError, DecodeError, EncodeError, TransportError};
pub use packet::{decode, encode, ActivePayload, IdPayload, MessagePayload, Packet, PacketKind};
pub use types::*;
