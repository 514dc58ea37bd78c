//! Fixed-delay jitter buffer
//!
//! Frames are queued in arrival order (which is sequence order) and decoded
//! concurrently. A periodic tick shows the newest decoded frame whose capture
//! time is at least the display delay in the past. Everything older is
//! consumed on the same tick, so the display never falls further behind than
//! the delay.
//!
//! All timestamps are milliseconds on the same wall clock as the frame
//! capture times.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use crate::error::DecodeError;
use crate::media::Frame;

use super::config::PlaybackConfig;
use super::stats::PlaybackStats;

/// Result of a finished decode
#[derive(Debug)]
pub struct Decoded<I> {
    pub sequence: u64,
    pub result: Result<I, DecodeError>,
    pub elapsed: Duration,
}

/// What happened on a tick
#[derive(Debug)]
pub struct TickOutcome<I> {
    /// Frame to display now, if any
    pub display: Option<(u64, I)>,
    /// New dry state, if it changed since the last tick
    pub dry: Option<bool>,
}

#[derive(Debug)]
struct QueueEntry<I> {
    sequence: u64,
    capture_time: u64,
    image: Option<I>,
    failed: bool,
}

/// Jitter buffer state machine
///
/// The buffer does not decode anything itself: [`push`](Self::push) says
/// whether a decode should be started, and its result comes back through
/// [`complete_decode`](Self::complete_decode).
#[derive(Debug)]
pub struct PlaybackBuffer<I> {
    display_delay_ms: u64,
    max_decodes: usize,
    max_queue_length: usize,
    dry_timeout_ms: u64,
    queue: VecDeque<QueueEntry<I>>,
    decoding: HashSet<u64>,
    last_arrival: Option<u64>,
    dry: bool,
    reported_dry: bool,
    stats: PlaybackStats,
}

impl<I> PlaybackBuffer<I> {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            display_delay_ms: config.display_delay.as_millis() as u64,
            max_decodes: config.max_decodes.max(1),
            max_queue_length: config.max_queue_length.max(1),
            dry_timeout_ms: config.dry_timeout.as_millis() as u64,
            queue: VecDeque::with_capacity(config.max_queue_length + 1),
            decoding: HashSet::new(),
            last_arrival: None,
            dry: false,
            reported_dry: false,
            stats: PlaybackStats::default(),
        }
    }

    /// Accept a frame that arrived at `now_ms`
    ///
    /// Returns true when the caller should start decoding it. A frame is
    /// refused while the decode bound is reached; accepting one may push the
    /// oldest entry out of the queue.
    pub fn push(&mut self, frame: &Frame, now_ms: u64) -> bool {
        self.stats.record_received(frame.size());
        self.last_arrival = Some(now_ms);
        self.dry = false;

        if self.decoding.len() >= self.max_decodes {
            self.stats.decoder_dropped += 1;
            return false;
        }

        self.decoding.insert(frame.sequence);
        self.queue.push_back(QueueEntry {
            sequence: frame.sequence,
            capture_time: frame.capture_time,
            image: None,
            failed: false,
        });

        if self.queue.len() > self.max_queue_length {
            self.queue.pop_front();
            self.stats.queue_dropped += 1;
        }
        self.stats.record_queue_depth(self.queue.len());

        true
    }

    /// Record a finished decode that completed at `now_ms`
    ///
    /// Returns false if the entry already left the queue; the image is then
    /// discarded.
    pub fn complete_decode(&mut self, decoded: Decoded<I>, now_ms: u64) -> bool {
        if !self.decoding.remove(&decoded.sequence) {
            return false;
        }

        let Some(entry) = self
            .queue
            .iter_mut()
            .find(|entry| entry.sequence == decoded.sequence)
        else {
            return false;
        };

        match decoded.result {
            Ok(image) => {
                let latency = now_ms.saturating_sub(entry.capture_time);
                self.stats.record_decoded(decoded.elapsed, latency);
                entry.image = Some(image);
            }
            Err(e) => {
                tracing::debug!(sequence = decoded.sequence, error = %e, "Frame decode failed");
                self.stats.decode_failures += 1;
                entry.failed = true;
            }
        }

        true
    }

    /// Advance the display clock to `now_ms`
    pub fn tick(&mut self, now_ms: u64) -> TickOutcome<I> {
        let drawing_time = now_ms.saturating_sub(self.display_delay_ms);
        let mut display = None;

        while self
            .queue
            .front()
            .is_some_and(|entry| entry.capture_time <= drawing_time)
        {
            let Some(entry) = self.queue.pop_front() else {
                break;
            };

            match entry.image {
                Some(image) => {
                    if display.replace((entry.sequence, image)).is_some() {
                        self.stats.dropped_too_fast += 1;
                    }
                }
                // Failures were counted when the decode came back
                None if entry.failed => {}
                None => self.stats.not_decoded_in_time += 1,
            }
        }

        if display.is_some() {
            self.stats.displayed += 1;
        }

        let timed_out = match self.last_arrival {
            None => true,
            Some(at) => now_ms.saturating_sub(at) > self.dry_timeout_ms,
        };
        if timed_out {
            self.dry = true;
        }

        let dry = if self.dry != self.reported_dry {
            self.reported_dry = self.dry;
            Some(self.dry)
        } else {
            None
        };

        TickOutcome { display, dry }
    }

    /// Drop everything and forget running decodes
    ///
    /// Results of decodes still running are ignored when they come back.
    /// Returns the number of entries abandoned.
    pub fn cancel(&mut self) -> usize {
        let abandoned = self.queue.len();
        self.queue.clear();
        self.decoding.clear();
        abandoned
    }

    pub fn is_dry(&self) -> bool {
        self.dry
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Decodes started and not yet completed
    pub fn in_flight(&self) -> usize {
        self.decoding.len()
    }

    pub fn stats(&self) -> &PlaybackStats {
        &self.stats
    }

    /// Return the counters collected so far and start over
    /// Count frames the player refused before they reached the buffer
    pub fn record_refused(&mut self, count: u64) {
        self.stats.refused += count;
    }

    /// Count a displayed frame whose draw event was lost
    pub fn record_undelivered(&mut self) {
        self.stats.undelivered += 1;
    }

    pub fn take_stats(&mut self) -> PlaybackStats {
        std::mem::take(&mut self.stats)
    }
}
