//! Message framing
//!
//! Every message is length prefixed:
//!
//! ```text
//! +----------------+----------+------------+----------------+-------------+------------+
//! | body_len (u32) | name_len | event name | json_len (u32) | JSON header | attachment |
//! |   big endian   |   (u8)   |  (ASCII)   |   big endian   |             | (rest)     |
//! +----------------+----------+------------+----------------+-------------+------------+
//!                  |<------------------------------ body_len ----------------------->|
//! ```
//!
//! Only `frame` messages carry an attachment (the image payload).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Size of the length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest message accepted by default (3 MB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 3_000_000;

/// An event before its header is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub event: String,
    /// JSON header
    pub header: Bytes,
    /// Binary attachment, empty for most events
    pub attachment: Bytes,
}

impl RawMessage {
    pub fn new(event: impl Into<String>, header: impl Into<Bytes>) -> Self {
        Self {
            event: event.into(),
            header: header.into(),
            attachment: Bytes::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Bytes) -> Self {
        self.attachment = attachment;
        self
    }

    /// Size of the encoded body (everything after the length prefix)
    pub fn body_len(&self) -> usize {
        1 + self.event.len() + 4 + self.header.len() + self.attachment.len()
    }
}

/// Length-prefixed message codec
#[derive(Debug, Clone, Copy)]
pub struct MessageCodec {
    max_message_size: usize,
}

impl MessageCodec {
    pub fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Append an encoded message to `dst`
    pub fn encode(&self, message: &RawMessage, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        if message.event.is_empty() || message.event.len() > u8::MAX as usize {
            return Err(ProtocolError::Malformed("event name length"));
        }
        if !message.event.is_ascii() {
            return Err(ProtocolError::Malformed("event name is not ASCII"));
        }

        let body_len = message.body_len();
        if body_len > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge {
                size: body_len,
                limit: self.max_message_size,
            });
        }

        dst.reserve(LENGTH_PREFIX_SIZE + body_len);
        dst.put_u32(body_len as u32);
        dst.put_u8(message.event.len() as u8);
        dst.put_slice(message.event.as_bytes());
        dst.put_u32(message.header.len() as u32);
        dst.put_slice(&message.header);
        dst.put_slice(&message.attachment);

        Ok(())
    }

    /// Take one message off the front of `src`
    ///
    /// Returns `Ok(None)` until a complete message is buffered.
    pub fn decode(&self, src: &mut BytesMut) -> Result<Option<RawMessage>, ProtocolError> {
        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let body_len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if body_len > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge {
                size: body_len,
                limit: self.max_message_size,
            });
        }

        let total = LENGTH_PREFIX_SIZE + body_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        frame.advance(LENGTH_PREFIX_SIZE);
        parse_body(frame.freeze()).map(Some)
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

fn parse_body(mut body: Bytes) -> Result<RawMessage, ProtocolError> {
    if body.remaining() < 1 {
        return Err(ProtocolError::Malformed("empty body"));
    }

    let name_len = body.get_u8() as usize;
    if name_len == 0 || body.remaining() < name_len + 4 {
        return Err(ProtocolError::Malformed("truncated event name"));
    }

    let name = body.split_to(name_len);
    let event = std::str::from_utf8(&name)
        .ok()
        .filter(|name| name.is_ascii())
        .ok_or(ProtocolError::Malformed("event name is not ASCII"))?
        .to_string();

    let header_len = body.get_u32() as usize;
    if body.remaining() < header_len {
        return Err(ProtocolError::Malformed("header longer than body"));
    }

    let header = body.split_to(header_len);

    Ok(RawMessage {
        event,
        header,
        attachment: body,
    })
}
