use bytes::Bytes;

use crate::error::DecodeError;

/// Turns a frame payload into something displayable
///
/// Decoding runs on the blocking pool, so implementations may take their
/// time; the player never waits for them on its display tick.
pub trait FrameDecoder: Send + Sync + 'static {
    /// Decoded image type
    type Image: Send + 'static;

    fn decode(&self, payload: Bytes) -> Result<Self::Image, DecodeError>;
}
