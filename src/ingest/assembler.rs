//! Frame assembly from pipe chunks
//!
//! A frame is the concatenation of consecutive chunks, terminated by the
//! first chunk shorter than the chunk size. The capture time of a frame is
//! the moment its first chunk arrived.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::media::{now_millis, Frame};
use crate::registry::{Distributor, StreamKey};
use crate::stats::PipeStats;

use super::channel::{ChannelEvent, DEFAULT_CHUNK_SIZE};

/// Builds frames out of a chunked byte stream
#[derive(Debug)]
pub struct FrameAssembler {
    chunk_size: usize,
    chunks: Vec<Bytes>,
    pending_time: Option<u64>,
    next_sequence: u64,
    stats: PipeStats,
}

impl FrameAssembler {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunks: Vec::new(),
            pending_time: None,
            next_sequence: 1,
            stats: PipeStats::new(),
        }
    }

    /// Feed a chunk received now
    pub fn push_chunk(&mut self, chunk: Bytes) -> Option<Frame> {
        self.push_chunk_at(chunk, now_millis())
    }

    /// Feed a chunk received at `time_ms`, returns a frame if it completed one
    pub fn push_chunk_at(&mut self, chunk: Bytes, time_ms: u64) -> Option<Frame> {
        let last = chunk.len() < self.chunk_size;

        self.pending_time.get_or_insert(time_ms);
        self.chunks.push(chunk);

        if last {
            self.complete()
        } else {
            None
        }
    }

    /// Emit whatever is buffered as a frame (end of stream)
    pub fn flush(&mut self) -> Option<Frame> {
        self.complete()
    }

    /// Bytes buffered for the frame in progress
    pub fn pending_len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    pub fn stats(&self) -> &PipeStats {
        &self.stats
    }

    fn complete(&mut self) -> Option<Frame> {
        let capture_time = self.pending_time.take();

        let payload = match self.chunks.len() {
            0 => return None,
            1 => self.chunks.pop()?,
            _ => {
                let mut buf = BytesMut::with_capacity(self.pending_len());
                for chunk in self.chunks.drain(..) {
                    buf.extend_from_slice(&chunk);
                }
                buf.freeze()
            }
        };

        let frame = Frame::new(
            self.next_sequence,
            capture_time.unwrap_or_else(now_millis),
            payload,
        );
        self.next_sequence += 1;
        self.stats.record_frame(frame.size());

        Some(frame)
    }

    /// Drive the assembler from a channel until the channel goes away
    ///
    /// Frames go to `distributor` under `key`. When the writer closes the
    /// channel, pending data is emitted and the stream is marked unavailable
    /// until the next frame.
    pub async fn run(
        mut self,
        key: StreamKey,
        mut rx: mpsc::Receiver<ChannelEvent>,
        distributor: Arc<Distributor>,
        stats_interval: Duration,
    ) {
        let period = stats_interval.max(Duration::from_millis(1));
        let mut report = interval_at(Instant::now() + period, period);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(ChannelEvent::Data(chunk)) => {
                        if let Some(frame) = self.push_chunk(chunk) {
                            distributor.dispatch(&key, frame);
                        }
                    }
                    Some(ChannelEvent::Closed) => {
                        if let Some(frame) = self.flush() {
                            distributor.dispatch(&key, frame);
                        }
                        self.stats.record_disconnect();
                        distributor.mark_unavailable(&key);
                    }
                    None => {
                        if let Some(frame) = self.flush() {
                            distributor.dispatch(&key, frame);
                        }
                        distributor.mark_unavailable(&key);
                        break;
                    }
                },
                _ = report.tick() => {
                    let throughput = self.stats.take_interval();
                    tracing::info!(
                        stream = %key,
                        fps = throughput.frames_per_sec(),
                        bitrate = throughput.bitrate(),
                        subscribers = distributor.subscriber_count(&key),
                        "Pipe throughput"
                    );
                }
            }
        }

        tracing::debug!(
            stream = %key,
            frames = self.stats.frames,
            disconnects = self.stats.disconnects,
            "Assembler stopped"
        );
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::media::Tier;
    use crate::registry::{ConsumerHandle, ConsumerId, Delivery};

    fn chunk(len: usize, fill: u8) -> Bytes {
        Bytes::from(vec![fill; len])
    }

    #[test]
    fn test_two_chunk_frame() {
        let mut assembler = FrameAssembler::new(8);

        assert!(assembler.push_chunk_at(chunk(8, 1), 100).is_none());
        assert_eq!(assembler.pending_len(), 8);

        let frame = assembler.push_chunk_at(chunk(3, 2), 140).unwrap();
        assert_eq!(frame.sequence, 1);
        assert_eq!(frame.capture_time, 100);
        assert_eq!(&frame.payload[..], &[1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2]);
        assert_eq!(assembler.pending_len(), 0);
    }

    #[test]
    fn test_short_chunk_is_whole_frame() {
        let mut assembler = FrameAssembler::new(8);

        let first = assembler.push_chunk_at(chunk(5, 1), 10).unwrap();
        let second = assembler.push_chunk_at(chunk(2, 2), 20).unwrap();

        assert_eq!((first.sequence, first.capture_time), (1, 10));
        assert_eq!((second.sequence, second.capture_time), (2, 20));
        assert_eq!(assembler.stats().frames, 2);
        assert_eq!(assembler.stats().bytes, 7);
    }

    #[test]
    fn test_empty_chunk_terminates_frame() {
        let mut assembler = FrameAssembler::new(4);

        assert!(assembler.push_chunk_at(chunk(4, 9), 1).is_none());
        let frame = assembler.push_chunk_at(Bytes::new(), 2).unwrap();
        assert_eq!(frame.size(), 4);
        assert_eq!(frame.capture_time, 1);
    }

    #[test]
    fn test_flush() {
        let mut assembler = FrameAssembler::new(4);
        assert!(assembler.flush().is_none());

        assembler.push_chunk_at(chunk(4, 1), 7);
        let frame = assembler.flush().unwrap();
        assert_eq!(frame.size(), 4);
        assert_eq!(frame.capture_time, 7);

        // The next frame gets a fresh capture time
        let next = assembler.push_chunk_at(chunk(1, 1), 9).unwrap();
        assert_eq!(next.capture_time, 9);
        assert_eq!(next.sequence, 2);
    }

    #[test]
    fn test_lone_empty_read_is_empty_frame() {
        let mut assembler = FrameAssembler::new(4);
        let frame = assembler.push_chunk_at(Bytes::new(), 1).unwrap();
        assert_eq!(frame.size(), 0);
        assert!(assembler.flush().is_none());
    }

    #[tokio::test]
    async fn test_run_dispatches_and_marks_unavailable() {
        let distributor = Arc::new(Distributor::new());
        let key = StreamKey::new("theta", Tier::Low);
        distributor.register_stream(key.clone());

        let (consumer, mut deliveries) = ConsumerHandle::channel(ConsumerId(1), 16);
        distributor.subscribe(&key, &consumer).unwrap();

        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(FrameAssembler::new(4).run(
            key.clone(),
            rx,
            distributor.clone(),
            Duration::from_secs(10),
        ));

        tx.send(ChannelEvent::Data(chunk(4, 1))).await.unwrap();
        tx.send(ChannelEvent::Data(chunk(2, 2))).await.unwrap();
        tx.send(ChannelEvent::Data(chunk(4, 3))).await.unwrap();
        tx.send(ChannelEvent::Closed).await.unwrap();
        drop(tx);
        task.await.unwrap();

        let mut events = Vec::new();
        while let Ok(delivery) = deliveries.try_recv() {
            events.push(match delivery {
                Delivery::Frame { frame, .. } => format!("frame {} {}", frame.sequence, frame.size()),
                Delivery::StreamState { live, .. } => format!("live {live}"),
            });
        }

        assert_eq!(
            events,
            vec!["live true", "frame 1 6", "frame 2 4", "live false"]
        );
        assert!(!distributor.is_live(&key));
    }

    proptest! {
        #[test]
        fn prop_frame_count_matches_short_chunks(
            lens in proptest::collection::vec(
                prop_oneof![Just(16usize), 0usize..16],
                0..64,
            )
        ) {
            let mut assembler = FrameAssembler::new(16);
            let mut sequences = Vec::new();

            for (i, len) in lens.iter().enumerate() {
                if let Some(frame) = assembler.push_chunk_at(chunk(*len, 0), i as u64) {
                    sequences.push(frame.sequence);
                }
            }
            if let Some(frame) = assembler.flush() {
                sequences.push(frame.sequence);
            }

            let short = lens.iter().filter(|len| **len < 16).count();
            let unflushed = lens.iter().rev().take_while(|len| **len == 16).count() > 0;
            let expected = short + usize::from(unflushed);

            prop_assert_eq!(sequences.len(), expected);
            prop_assert!(sequences.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
