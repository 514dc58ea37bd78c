//! Playback instrumentation

use std::time::Duration;

/// Counters kept by a playback buffer
///
/// The four drop categories are distinct: a frame is counted in at most one
/// of them. `refused` and `undelivered` are kept by the player around the
/// buffer and are not part of [`total_dropped`](Self::total_dropped).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackStats {
    /// Frames received
    pub frames_received: u64,
    /// Payload bytes received
    pub bytes_received: u64,
    /// Successful decodes
    pub decoded: u64,
    /// Failed decodes
    pub decode_failures: u64,
    /// Total time spent decoding
    pub decode_time: Duration,
    /// Longest single decode
    pub decode_time_max: Duration,
    /// Sum of capture-to-decoded latencies in milliseconds
    pub latency_total_ms: u64,
    /// Largest capture-to-decoded latency in milliseconds
    pub latency_max_ms: u64,
    /// Frames dropped because too many decodes were running
    pub decoder_dropped: u64,
    /// Frames dropped because the queue was full
    pub queue_dropped: u64,
    /// Frames whose display time came before their decode finished
    pub not_decoded_in_time: u64,
    /// Decoded frames skipped because a newer one was due on the same tick
    pub dropped_too_fast: u64,
    /// Frames displayed
    pub displayed: u64,
    /// Frames refused because the player's inbox was full
    pub refused: u64,
    /// Draw events lost because the event channel was full
    pub undelivered: u64,
    /// Largest queue depth observed
    pub queue_depth_max: usize,
}

impl PlaybackStats {
    pub fn record_received(&mut self, size: usize) {
        self.frames_received += 1;
        self.bytes_received += size as u64;
    }

    pub fn record_decoded(&mut self, elapsed: Duration, latency_ms: u64) {
        self.decoded += 1;
        self.decode_time += elapsed;
        self.decode_time_max = self.decode_time_max.max(elapsed);
        self.latency_total_ms += latency_ms;
        self.latency_max_ms = self.latency_max_ms.max(latency_ms);
    }

    pub fn record_queue_depth(&mut self, depth: usize) {
        self.queue_depth_max = self.queue_depth_max.max(depth);
    }

    /// Total frames dropped across all categories
    pub fn total_dropped(&self) -> u64 {
        self.decoder_dropped + self.queue_dropped + self.not_decoded_in_time + self.dropped_too_fast
    }

    /// Mean capture-to-decoded latency in milliseconds
    pub fn average_latency_ms(&self) -> u64 {
        if self.decoded == 0 {
            0
        } else {
            self.latency_total_ms / self.decoded
        }
    }

    /// Mean decode duration
    pub fn average_decode_time(&self) -> Duration {
        match u32::try_from(self.decoded) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.decode_time / n,
            Err(_) => Duration::ZERO,
        }
    }
}
