//! Stream entry and state types
//!
//! This module defines the per-stream state stored in the distributor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use super::frame::{ConsumerHandle, ConsumerId};

/// Entry for a single stream in the distributor
pub struct StreamEntry {
    /// Current subscribers
    pub(super) subscribers: HashMap<ConsumerId, ConsumerHandle>,

    /// Whether the ingest channel is currently delivering
    pub(super) live: AtomicBool,

    /// Frames dispatched to this stream
    pub(super) frames_dispatched: AtomicU64,

    /// Frame deliveries accepted by consumer queues
    pub(super) deliveries: AtomicU64,

    /// Frame deliveries dropped because a consumer queue was full
    pub(super) dropped: AtomicU64,

    /// Sequence number of the last dispatched frame
    pub(super) last_sequence: AtomicU64,

    /// When the stream was registered
    pub created_at: Instant,
}

impl StreamEntry {
    pub(super) fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
            live: AtomicBool::new(false),
            frames_dispatched: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            last_sequence: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    /// Get the number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Relaxed)
    }

    /// Snapshot the current membership
    pub(super) fn members(&self) -> Vec<ConsumerHandle> {
        self.subscribers.values().cloned().collect()
    }

    pub(super) fn stats(&self) -> StreamStats {
        StreamStats {
            subscriber_count: self.subscriber_count(),
            live: self.is_live(),
            frames_dispatched: self.frames_dispatched.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            last_sequence: self.last_sequence.load(Ordering::Relaxed),
        }
    }
}

/// Statistics for a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStats {
    /// Number of active subscribers
    pub subscriber_count: usize,
    /// Whether frames are currently flowing
    pub live: bool,
    /// Frames dispatched
    pub frames_dispatched: u64,
    /// Frame deliveries queued for consumers
    pub deliveries: u64,
    /// Frame deliveries dropped on full consumer queues
    pub dropped: u64,
    /// Last dispatched sequence number
    pub last_sequence: u64,
}

/// Result of dispatching one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub dropped: usize,
}
