//! Frame types shared by the ingest, distribution and playback paths

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Quality level of a device stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Full capture resolution
    Original,
    /// Half resolution
    Low,
}

impl Tier {
    /// All tiers a device publishes
    pub const ALL: [Tier; 2] = [Tier::Original, Tier::Low];

    /// Name used in pipe paths and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Original => "original",
            Tier::Low => "low",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete, immutable frame as produced by a `FrameAssembler`
///
/// Cheap to clone: the payload is reference counted, so every subscriber
/// shares the same allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Per-assembler sequence number, strictly increasing, gaps allowed
    pub sequence: u64,
    /// Wall-clock time (ms since the Unix epoch) at which the first byte arrived
    pub capture_time: u64,
    /// Encoded image (JPEG)
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame
    pub fn new(sequence: u64, capture_time: u64, payload: Bytes) -> Self {
        Self {
            sequence,
            capture_time,
            payload,
        }
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch
///
/// Capture times travel between processes, so both ends use the wall clock.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
