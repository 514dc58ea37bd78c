//! Viewer wire protocol
//!
//! A bidirectional stream of named events. Each event carries a JSON header
//! and optionally a binary attachment, so frames travel without any
//! re-encoding of their payload.

pub mod codec;
pub mod message;

pub use codec::{MessageCodec, RawMessage, DEFAULT_MAX_MESSAGE_SIZE};
pub use message::{AppState, ClientMessage, ConfigPayload, DeviceState, ServerMessage};
