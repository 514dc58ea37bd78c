//! Distributor implementation
//!
//! The central registry that tracks subscriptions per stream and fans every
//! assembled frame out to the subscribers of its stream.

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use parking_lot::RwLock;

use crate::media::Frame;

use super::entry::{DispatchReport, StreamEntry, StreamStats};
use super::error::RegistryError;
use super::frame::{ConsumerHandle, ConsumerId, Delivery, StreamKey};

/// Central registry for all streams
///
/// Fan-out is a synchronous loop over a snapshot of the membership taken
/// when the frame is dispatched, so subscriptions changing mid-dispatch only
/// affect later frames. Consumers are offered deliveries without waiting;
/// a full consumer queue loses that frame and nobody else notices.
///
/// # Example
/// ```
/// use bytes::Bytes;
/// use spherecast::registry::{ConsumerHandle, ConsumerId, Delivery};
/// use spherecast::{Distributor, Frame, StreamKey, Tier};
///
/// # tokio_test::block_on(async {
/// let distributor = Distributor::new();
/// let key = StreamKey::new("theta_1", Tier::Low);
/// distributor.register_stream(key.clone());
///
/// let (consumer, mut rx) = ConsumerHandle::channel(ConsumerId(1), 8);
/// distributor.subscribe(&key, &consumer).unwrap();
/// distributor.dispatch(&key, Frame::new(1, 0, Bytes::from_static(b"jpeg")));
///
/// assert!(matches!(rx.recv().await, Some(Delivery::StreamState { live: true, .. })));
/// assert!(matches!(rx.recv().await, Some(Delivery::Frame { .. })));
/// # });
/// ```
pub struct Distributor {
    /// Map of stream key to stream entry
    streams: RwLock<HashMap<StreamKey, StreamEntry>>,
}

impl Distributor {
    /// Create an empty distributor
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Register a stream that consumers may subscribe to
    pub fn register_stream(&self, key: StreamKey) {
        let mut streams = self.streams.write();
        if !streams.contains_key(&key) {
            tracing::debug!(stream = %key, "Stream registered");
            streams.insert(key, StreamEntry::new());
        }
    }

    /// Subscribe a consumer to a stream
    ///
    /// Idempotent: returns `Ok(false)` if the consumer was already a member.
    pub fn subscribe(
        &self,
        key: &StreamKey,
        consumer: &ConsumerHandle,
    ) -> Result<bool, RegistryError> {
        let mut streams = self.streams.write();
        let entry = streams
            .get_mut(key)
            .ok_or_else(|| RegistryError::StreamNotFound(key.clone()))?;

        if entry.subscribers.contains_key(&consumer.id()) {
            return Ok(false);
        }

        entry.subscribers.insert(consumer.id(), consumer.clone());

        tracing::info!(
            stream = %key,
            consumer = %consumer.id(),
            subscribers = entry.subscriber_count(),
            "Subscriber added"
        );

        Ok(true)
    }

    /// Unsubscribe a consumer from a stream, no-op if it isn't a member
    pub fn unsubscribe(&self, key: &StreamKey, consumer: ConsumerId) -> bool {
        let mut streams = self.streams.write();

        let Some(entry) = streams.get_mut(key) else {
            return false;
        };

        let removed = entry.subscribers.remove(&consumer).is_some();
        if removed {
            tracing::info!(
                stream = %key,
                consumer = %consumer,
                subscribers = entry.subscriber_count(),
                "Subscriber removed"
            );
        }
        removed
    }

    /// Remove a consumer from every stream, returns the number of streams left
    pub fn unsubscribe_all(&self, consumer: ConsumerId) -> usize {
        let mut streams = self.streams.write();
        let mut removed = 0;

        for (key, entry) in streams.iter_mut() {
            if entry.subscribers.remove(&consumer).is_some() {
                removed += 1;
                tracing::debug!(stream = %key, consumer = %consumer, "Subscriber removed");
            }
        }

        removed
    }

    /// Fan a frame out to every current subscriber of its stream
    ///
    /// A stream that was not live becomes live and its subscribers are told
    /// so before they receive the frame.
    pub fn dispatch(&self, key: &StreamKey, frame: Frame) -> DispatchReport {
        let (members, came_back) = {
            let streams = self.streams.read();
            let Some(entry) = streams.get(key) else {
                return DispatchReport::default();
            };

            entry.frames_dispatched.fetch_add(1, Ordering::Relaxed);
            entry.last_sequence.store(frame.sequence, Ordering::Relaxed);
            let came_back = !entry.live.swap(true, Ordering::Relaxed);

            (entry.members(), came_back)
        };

        if came_back {
            tracing::info!(stream = %key, sequence = frame.sequence, "Stream live");
            for member in &members {
                member.offer(Delivery::StreamState {
                    key: key.clone(),
                    live: true,
                });
            }
        }

        let mut report = DispatchReport::default();
        for member in &members {
            let delivery = Delivery::Frame {
                key: key.clone(),
                frame: frame.clone(),
            };
            if member.offer(delivery) {
                report.delivered += 1;
            } else {
                report.dropped += 1;
                tracing::trace!(
                    stream = %key,
                    consumer = %member.id(),
                    sequence = frame.sequence,
                    "Consumer queue full, frame dropped"
                );
            }
        }

        if let Some(entry) = self.streams.read().get(key) {
            entry
                .deliveries
                .fetch_add(report.delivered as u64, Ordering::Relaxed);
            entry
                .dropped
                .fetch_add(report.dropped as u64, Ordering::Relaxed);
        }

        report
    }

    /// Mark a stream as temporarily unavailable and tell its subscribers
    pub fn mark_unavailable(&self, key: &StreamKey) {
        let members = {
            let streams = self.streams.read();
            let Some(entry) = streams.get(key) else {
                return;
            };
            if !entry.live.swap(false, Ordering::Relaxed) {
                return;
            }
            entry.members()
        };

        tracing::info!(stream = %key, subscribers = members.len(), "Stream unavailable");

        for member in &members {
            member.offer(Delivery::StreamState {
                key: key.clone(),
                live: false,
            });
        }
    }

    /// Check if a stream is registered
    pub fn stream_exists(&self, key: &StreamKey) -> bool {
        self.streams.read().contains_key(key)
    }

    /// Check if a stream currently delivers frames
    pub fn is_live(&self, key: &StreamKey) -> bool {
        self.streams
            .read()
            .get(key)
            .map(StreamEntry::is_live)
            .unwrap_or(false)
    }

    /// Number of subscribers of a stream
    pub fn subscriber_count(&self, key: &StreamKey) -> usize {
        self.streams
            .read()
            .get(key)
            .map(StreamEntry::subscriber_count)
            .unwrap_or(0)
    }

    /// Get stream statistics
    pub fn get_stream_stats(&self, key: &StreamKey) -> Option<StreamStats> {
        self.streams.read().get(key).map(StreamEntry::stats)
    }

    /// Get total number of streams
    pub fn stream_count(&self) -> usize {
        self.streams.read().len()
    }
}

impl Default for Distributor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::media::Tier;

    fn frame(sequence: u64) -> Frame {
        Frame::new(sequence, 1_000 + sequence, Bytes::from_static(&[0xFF, 0xD8]))
    }

    fn distributor() -> (Distributor, StreamKey) {
        let distributor = Distributor::new();
        let key = StreamKey::new("theta", Tier::Low);
        distributor.register_stream(key.clone());
        distributor.register_stream(StreamKey::new("theta", Tier::Original));
        (distributor, key)
    }

    fn next_frame(rx: &mut tokio::sync::mpsc::Receiver<Delivery>) -> Option<Frame> {
        loop {
            match rx.try_recv().ok()? {
                Delivery::Frame { frame, .. } => return Some(frame),
                Delivery::StreamState { .. } => continue,
            }
        }
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let (distributor, key) = distributor();
        let (consumer, _rx) = ConsumerHandle::channel(ConsumerId(1), 8);

        assert_eq!(distributor.subscribe(&key, &consumer), Ok(true));
        assert_eq!(distributor.subscribe(&key, &consumer), Ok(false));
        assert_eq!(distributor.subscriber_count(&key), 1);
    }

    #[test]
    fn test_unsubscribe_non_member_is_noop() {
        let (distributor, key) = distributor();
        let (consumer, _rx) = ConsumerHandle::channel(ConsumerId(1), 8);
        distributor.subscribe(&key, &consumer).unwrap();

        assert!(!distributor.unsubscribe(&key, ConsumerId(2)));
        assert!(!distributor.unsubscribe(&StreamKey::new("nope", Tier::Low), ConsumerId(1)));
        assert_eq!(distributor.subscriber_count(&key), 1);

        assert!(distributor.unsubscribe(&key, ConsumerId(1)));
        assert!(!distributor.unsubscribe(&key, ConsumerId(1)));
        assert_eq!(distributor.subscriber_count(&key), 0);
    }

    #[test]
    fn test_subscribe_unknown_stream() {
        let (distributor, _) = distributor();
        let (consumer, _rx) = ConsumerHandle::channel(ConsumerId(1), 8);
        let key = StreamKey::new("missing", Tier::Low);

        assert_eq!(
            distributor.subscribe(&key, &consumer),
            Err(RegistryError::StreamNotFound(key))
        );
    }

    #[test]
    fn test_dispatch_only_to_matching_tier() {
        let (distributor, low) = distributor();
        let original = StreamKey::new("theta", Tier::Original);
        let (a, mut rx_a) = ConsumerHandle::channel(ConsumerId(1), 8);
        let (b, mut rx_b) = ConsumerHandle::channel(ConsumerId(2), 8);
        distributor.subscribe(&low, &a).unwrap();
        distributor.subscribe(&original, &b).unwrap();

        let report = distributor.dispatch(&low, frame(1));

        assert_eq!(report, DispatchReport { delivered: 1, dropped: 0 });
        assert_eq!(next_frame(&mut rx_a).unwrap().sequence, 1);
        assert!(next_frame(&mut rx_b).is_none());
    }

    #[test]
    fn test_slow_consumer_does_not_affect_others() {
        let (distributor, key) = distributor();
        let (slow, _slow_rx) = ConsumerHandle::channel(ConsumerId(1), 2);
        let (fast, mut fast_rx) = ConsumerHandle::channel(ConsumerId(2), 64);
        distributor.subscribe(&key, &slow).unwrap();
        distributor.subscribe(&key, &fast).unwrap();

        let mut dropped = 0;
        for seq in 1..=10 {
            dropped += distributor.dispatch(&key, frame(seq)).dropped;
        }

        // The slow queue holds the live notification and one frame
        assert_eq!(dropped, 9);
        let received: Vec<u64> = std::iter::from_fn(|| next_frame(&mut fast_rx))
            .map(|f| f.sequence)
            .collect();
        assert_eq!(received, (1..=10).collect::<Vec<_>>());

        let stats = distributor.get_stream_stats(&key).unwrap();
        assert_eq!(stats.frames_dispatched, 10);
        assert_eq!(stats.deliveries, 11);
        assert_eq!(stats.dropped, 9);
        assert_eq!(stats.last_sequence, 10);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_frames() {
        let (distributor, key) = distributor();
        let (early, mut early_rx) = ConsumerHandle::channel(ConsumerId(1), 8);
        let (late, mut late_rx) = ConsumerHandle::channel(ConsumerId(2), 8);

        distributor.subscribe(&key, &early).unwrap();
        distributor.dispatch(&key, frame(1));
        distributor.subscribe(&key, &late).unwrap();
        distributor.dispatch(&key, frame(2));

        assert_eq!(next_frame(&mut early_rx).unwrap().sequence, 1);
        assert_eq!(next_frame(&mut early_rx).unwrap().sequence, 2);
        assert_eq!(next_frame(&mut late_rx).unwrap().sequence, 2);
    }

    #[test]
    fn test_liveness_notifications() {
        let (distributor, key) = distributor();
        let (consumer, mut rx) = ConsumerHandle::channel(ConsumerId(1), 8);
        distributor.subscribe(&key, &consumer).unwrap();

        assert!(!distributor.is_live(&key));
        distributor.dispatch(&key, frame(1));
        assert!(distributor.is_live(&key));

        assert_eq!(
            rx.try_recv().unwrap(),
            Delivery::StreamState { key: key.clone(), live: true }
        );
        assert!(matches!(rx.try_recv().unwrap(), Delivery::Frame { .. }));

        distributor.mark_unavailable(&key);
        distributor.mark_unavailable(&key);
        assert_eq!(
            rx.try_recv().unwrap(),
            Delivery::StreamState { key: key.clone(), live: false }
        );
        // Second call was a no-op
        assert!(rx.try_recv().is_err());

        distributor.dispatch(&key, frame(2));
        assert_eq!(
            rx.try_recv().unwrap(),
            Delivery::StreamState { key, live: true }
        );
    }

    #[test]
    fn test_unsubscribe_all() {
        let (distributor, low) = distributor();
        let original = StreamKey::new("theta", Tier::Original);
        let (consumer, _rx) = ConsumerHandle::channel(ConsumerId(7), 8);
        distributor.subscribe(&low, &consumer).unwrap();
        distributor.subscribe(&original, &consumer).unwrap();

        assert_eq!(distributor.unsubscribe_all(ConsumerId(7)), 2);
        assert_eq!(distributor.subscriber_count(&low), 0);
        assert_eq!(distributor.subscriber_count(&original), 0);
    }

    #[test]
    fn test_dispatch_unknown_stream() {
        let (distributor, _) = distributor();
        let report = distributor.dispatch(&StreamKey::new("nope", Tier::Low), frame(1));

        assert_eq!(report, DispatchReport::default());
        assert_eq!(distributor.stream_count(), 2);
    }
}
