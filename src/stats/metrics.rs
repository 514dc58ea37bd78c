//! Statistics for ingest pipes and the feed server

use std::time::{Duration, Instant};

/// Throughput of one ingest pipe
///
/// Totals accumulate for the lifetime of the pipe; the interval counters are
/// reset every time a report is taken.
#[derive(Debug, Clone)]
pub struct PipeStats {
    /// Frames assembled
    pub frames: u64,
    /// Payload bytes assembled
    pub bytes: u64,
    /// Times the channel ended
    pub disconnects: u64,
    frames_in_interval: u64,
    bytes_in_interval: u64,
    interval_started: Instant,
}

/// Throughput over one reporting interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputReport {
    pub frames: u64,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl ThroughputReport {
    /// Frames per second, rounded to one decimal
    pub fn frames_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.frames as f64 / secs * 10.0).round() / 10.0
        } else {
            0.0
        }
    }

    /// Bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.bytes as f64 * 8.0 / secs) as u64
        } else {
            0
        }
    }
}

impl PipeStats {
    pub fn new() -> Self {
        Self {
            frames: 0,
            bytes: 0,
            disconnects: 0,
            frames_in_interval: 0,
            bytes_in_interval: 0,
            interval_started: Instant::now(),
        }
    }

    /// Count an assembled frame
    pub fn record_frame(&mut self, size: usize) {
        self.frames += 1;
        self.bytes += size as u64;
        self.frames_in_interval += 1;
        self.bytes_in_interval += size as u64;
    }

    pub fn record_disconnect(&mut self) {
        self.disconnects += 1;
    }

    /// Report the interval since the previous report and start a new one
    pub fn take_interval(&mut self) -> ThroughputReport {
        let now = Instant::now();
        let report = ThroughputReport {
            frames: self.frames_in_interval,
            bytes: self.bytes_in_interval,
            elapsed: now.duration_since(self.interval_started),
        };

        self.frames_in_interval = 0;
        self.bytes_in_interval = 0;
        self.interval_started = now;

        report
    }
}

impl Default for PipeStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Total connections ever
    pub total_connections: u64,
    /// Current active connections
    pub active_connections: u64,
    /// Registered streams
    pub streams: u64,
    /// Cameras under control
    pub cameras: u64,
}
