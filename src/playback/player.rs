//! Async playback driver
//!
//! A [`Player`] owns a [`PlaybackBuffer`] inside a task. Frames come in over
//! a channel, decodes run on the blocking pool and the display tick runs on
//! its own fixed schedule, so a slow decoder can never delay a tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::media::{now_millis, Frame};

use super::buffer::{Decoded, PlaybackBuffer};
use super::config::PlaybackConfig;
use super::decoder::FrameDecoder;
use super::stats::PlaybackStats;

/// Output of a player
#[derive(Debug)]
pub enum PlaybackEvent<I> {
    /// Show this image now
    Draw { sequence: u64, image: I },
    /// The stream went dry (`true`) or has data again (`false`)
    Dry(bool),
    /// Periodic statistics, only with instrumentation enabled
    Stats(PlaybackStats),
}

/// Handle to a running playback task
///
/// Dropping the handle stops playback. Decodes still running are abandoned
/// and their results discarded.
#[derive(Debug)]
pub struct Player {
    frames: mpsc::Sender<Frame>,
    refused: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl Player {
    /// Start a player, returns the handle and the event stream
    pub fn spawn<D: FrameDecoder>(
        config: PlaybackConfig,
        decoder: D,
    ) -> (Self, mpsc::Receiver<PlaybackEvent<D::Image>>) {
        let (frames_tx, frames_rx) = mpsc::channel(config.max_queue_length.max(1) * 2);
        let (events_tx, events_rx) = mpsc::channel(64);

        let refused = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(run(
            config,
            Arc::new(decoder),
            frames_rx,
            events_tx,
            refused.clone(),
        ));

        (
            Self {
                frames: frames_tx,
                refused,
                task,
            },
            events_rx,
        )
    }

    /// Hand a received frame to the player
    ///
    /// Never waits; returns false if the frame could not be queued. Frames
    /// refused by a full inbox show up in [`PlaybackStats::refused`].
    pub fn push(&self, frame: Frame) -> bool {
        match self.frames.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                tracing::trace!(sequence = frame.sequence, "Player inbox full, frame refused");
                self.refused.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Sender for feeding frames from another task
    pub fn sender(&self) -> mpsc::Sender<Frame> {
        self.frames.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop playback immediately
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<D: FrameDecoder>(
    config: PlaybackConfig,
    decoder: Arc<D>,
    mut frames: mpsc::Receiver<Frame>,
    events: mpsc::Sender<PlaybackEvent<D::Image>>,
    refused: Arc<AtomicU64>,
) {
    let mut buffer = PlaybackBuffer::new(&config);
    let (done_tx, mut done_rx) = mpsc::channel::<Decoded<D::Image>>(config.max_decodes.max(1));

    let mut ticker = interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut report = interval(config.stats_interval);
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);
    report.tick().await;

    tracing::debug!(
        delay_ms = config.display_delay.as_millis() as u64,
        max_decodes = config.max_decodes,
        "Player started"
    );

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    break;
                };

                if buffer.push(&frame, now_millis()) {
                    let decoder = decoder.clone();
                    let done_tx = done_tx.clone();
                    tokio::task::spawn_blocking(move || {
                        let started = Instant::now();
                        let result = decoder.decode(frame.payload);
                        // The player may be gone already
                        let _ = done_tx.blocking_send(Decoded {
                            sequence: frame.sequence,
                            result,
                            elapsed: started.elapsed(),
                        });
                    });
                }
            }
            Some(decoded) = done_rx.recv() => {
                buffer.complete_decode(decoded, now_millis());
            }
            _ = ticker.tick() => {
                let outcome = buffer.tick(now_millis());

                if let Some(dry) = outcome.dry {
                    tracing::debug!(dry, "Stream dry state changed");
                    if events.try_send(PlaybackEvent::Dry(dry)).is_err() && events.is_closed() {
                        break;
                    }
                }

                if let Some((sequence, image)) = outcome.display {
                    match events.try_send(PlaybackEvent::Draw { sequence, image }) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            tracing::trace!(sequence, "Event channel full, draw lost");
                            buffer.record_undelivered();
                        }
                        Err(TrySendError::Closed(_)) => break,
                    }
                }
            }
            _ = report.tick(), if config.instrument => {
                buffer.record_refused(refused.swap(0, Ordering::Relaxed));
                let stats = buffer.take_stats();
                tracing::info!(
                    received = stats.frames_received,
                    displayed = stats.displayed,
                    decoded = stats.decoded,
                    decode_failures = stats.decode_failures,
                    avg_decode_ms = stats.average_decode_time().as_millis() as u64,
                    avg_latency_ms = stats.average_latency_ms(),
                    max_latency_ms = stats.latency_max_ms,
                    decoder_dropped = stats.decoder_dropped,
                    queue_dropped = stats.queue_dropped,
                    not_decoded_in_time = stats.not_decoded_in_time,
                    dropped_too_fast = stats.dropped_too_fast,
                    queue_depth_max = stats.queue_depth_max,
                    refused = stats.refused,
                    undelivered = stats.undelivered,
                    "Playback stats"
                );
                if events.try_send(PlaybackEvent::Stats(stats)).is_err() && events.is_closed() {
                    break;
                }
            }
        }
    }

    let abandoned = buffer.cancel();
    tracing::debug!(abandoned, "Player stopped");
}
