//! Playback configuration

use std::time::Duration;

/// Default display delay
pub const DEFAULT_DISPLAY_DELAY: Duration = Duration::from_millis(250);

/// Default bound on concurrent decodes
pub const DEFAULT_MAX_DECODES: usize = 20;

/// Default bound on queued frames
pub const DEFAULT_MAX_QUEUE_LENGTH: usize = 30;

/// Default display tick period
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Default time without frames before a stream counts as dry
pub const DEFAULT_DRY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default instrumentation report interval
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Playback buffer and player configuration
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// How far behind capture time frames are displayed
    pub display_delay: Duration,

    /// Frames arriving while this many decodes are running are dropped
    pub max_decodes: usize,

    /// Queue length above which the oldest entry is dropped
    pub max_queue_length: usize,

    /// Display tick period
    pub tick_interval: Duration,

    /// Time without frames before the stream is reported dry
    pub dry_timeout: Duration,

    /// Emit periodic statistics
    pub instrument: bool,

    /// Statistics report interval
    pub stats_interval: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            display_delay: DEFAULT_DISPLAY_DELAY,
            max_decodes: DEFAULT_MAX_DECODES,
            max_queue_length: DEFAULT_MAX_QUEUE_LENGTH,
            tick_interval: DEFAULT_TICK_INTERVAL,
            dry_timeout: DEFAULT_DRY_TIMEOUT,
            instrument: false,
            stats_interval: DEFAULT_STATS_INTERVAL,
        }
    }
}

impl PlaybackConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the display delay
    pub fn display_delay(mut self, delay: Duration) -> Self {
        self.display_delay = delay;
        self
    }

    /// Set the display delay from a device's configured delay in milliseconds
    pub fn display_delay_ms(self, delay: u64) -> Self {
        self.display_delay(Duration::from_millis(delay))
    }

    /// Set the decode concurrency bound
    pub fn max_decodes(mut self, max: usize) -> Self {
        self.max_decodes = max.max(1);
        self
    }

    /// Set the queue length bound
    pub fn max_queue_length(mut self, max: usize) -> Self {
        self.max_queue_length = max.max(1);
        self
    }

    /// Set the tick period
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set the dry timeout
    pub fn dry_timeout(mut self, timeout: Duration) -> Self {
        self.dry_timeout = timeout;
        self
    }

    /// Enable or disable instrumentation
    pub fn instrument(mut self, enabled: bool) -> Self {
        self.instrument = enabled;
        self
    }

    /// Set the statistics report interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval.max(Duration::from_millis(1));
        self
    }
}
