//! Client-side playback
//!
//! Received frames go through a fixed-delay jitter buffer before they are
//! shown. The buffer bounds decode concurrency and queue length, drops
//! whatever it cannot show in time, and reports when a stream runs dry.
//!
//! [`PlaybackBuffer`] is the synchronous state machine; [`Player`] runs it in
//! a task with a decode pool and a periodic display tick.

pub mod buffer;
pub mod config;
pub mod decoder;
pub mod player;
pub mod stats;

pub use buffer::{Decoded, PlaybackBuffer, TickOutcome};
pub use config::PlaybackConfig;
pub use decoder::FrameDecoder;
pub use player::{PlaybackEvent, Player};
pub use stats::PlaybackStats;
