//! Routing types for frame distribution
//!
//! This module defines the key identifying a stream, the identity of a
//! consumer and what gets delivered to it.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::media::{Frame, Tier};

/// Unique identifier for a stream (device + quality tier)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    /// Device key (validated at config load)
    pub device: Arc<str>,
    /// Quality tier
    pub tier: Tier,
}

impl StreamKey {
    /// Create a new stream key
    pub fn new(device: impl Into<Arc<str>>, tier: Tier) -> Self {
        Self {
            device: device.into(),
            tier,
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.tier)
    }
}

/// Identity of a consumer (one per viewer connection)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub u64);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something delivered to a consumer
///
/// Cheap to clone: the key is reference counted and so is the frame payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// A frame of a subscribed stream
    Frame { key: StreamKey, frame: Frame },
    /// A subscribed stream went away or came back
    StreamState { key: StreamKey, live: bool },
}

/// Sending side of a consumer's delivery queue
///
/// Delivery never waits: when the queue is full the delivery is dropped
/// for that consumer only.
#[derive(Debug, Clone)]
pub struct ConsumerHandle {
    id: ConsumerId,
    tx: mpsc::Sender<Delivery>,
}

impl ConsumerHandle {
    /// Create a handle and the queue it feeds
    pub fn channel(id: ConsumerId, capacity: usize) -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }

    /// Offer a delivery, returns false if it was dropped
    pub fn offer(&self, delivery: Delivery) -> bool {
        self.tx.try_send(delivery).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
