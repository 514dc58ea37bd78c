//! Feed viewer example
//!
//! Run with: cargo run --example feed_viewer <SERVER_ADDR> <DEVICE> [low|original]
//!
//! Examples:
//!   cargo run --example feed_viewer 127.0.0.1:8000 theta_1          # low tier
//!   cargo run --example feed_viewer 127.0.0.1:8000 theta_1 original
//!
//! Subscribes to one device, plays its frames through a delayed playback
//! buffer and animates every camera of the device towards the shared
//! targets. Draws are logged instead of rendered.
//!
//! ## Pipeline
//!
//! ```text
//!   FeedClient ──► Frame ──► Player (delay, decode, drop) ──► Draw
//!        │
//!        └──────► CameraTarget ──► OrientationAnimator ──► tick (60 Hz)
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use spherecast::camera::CameraSettings;
use spherecast::media::{JpegImage, JpegDecoder};
use spherecast::playback::PlaybackEvent;
use spherecast::protocol::ServerMessage;
use spherecast::{FeedClient, OrientationAnimator, PlaybackConfig, Player, Tier};

const ANIMATION_TICK: Duration = Duration::from_millis(16);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spherecast=info".parse()?)
                .add_directive("feed_viewer=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (addr, device) = match args.as_slice() {
        [addr, device, ..] => (addr.clone(), device.clone()),
        _ => return Err("usage: feed_viewer <SERVER_ADDR> <DEVICE> [low|original]".into()),
    };
    let tier = match args.get(2).map(String::as_str) {
        None | Some("low") => Tier::Low,
        Some("original") => Tier::Original,
        Some(other) => return Err(format!("unknown tier: {other}").into()),
    };

    let (mut client, mut events) = FeedClient::connect(addr.as_str()).await?;

    // ========================================================================
    // Initial sync: config first, then app state
    // ========================================================================

    let config = match events.recv().await {
        Some(ServerMessage::Config(config)) => config,
        other => return Err(format!("expected config, got {other:?}").into()),
    };
    let device_config = config
        .device(&device)
        .ok_or_else(|| format!("unknown device: {device}"))?
        .clone();

    let mut animators = HashMap::new();
    for camera in &device_config.cameras {
        let settings = Arc::new(CameraSettings::from_config(camera)?);
        animators.insert(camera.key.clone(), OrientationAnimator::new(settings));
    }

    let mut debug = false;
    let (mut player, mut playback) = start_player(device_config.delay, debug);

    client.start_stream(&device, tier).await?;
    tracing::info!(device = %device, tier = %tier, cameras = animators.len(), "Viewing");

    // ========================================================================
    // Event loop
    // ========================================================================

    let mut ticker = tokio::time::interval(ANIMATION_TICK);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::info!("Server closed the connection");
                    break;
                };

                match event {
                    ServerMessage::Frame { device: from, frame, .. } if from == device => {
                        if !player.push(frame) {
                            tracing::debug!("Player busy, frame dropped");
                        }
                    }
                    ServerMessage::CameraTarget(update) => {
                        if let Some(animator) = animators.get_mut(&update.camera) {
                            animator.set_target(update.target());
                        }
                    }
                    ServerMessage::App(state) if state.debug != debug => {
                        // Instrumentation is fixed per player
                        debug = state.debug;
                        player.stop();
                        (player, playback) = start_player(device_config.delay, debug);
                    }
                    ServerMessage::StreamState { live, .. } => {
                        tracing::info!(live = live, "Stream state");
                    }
                    ServerMessage::DeviceState(state) if state.device == device => {
                        tracing::info!(battery = ?state.battery, "Device state");
                    }
                    _ => {}
                }
            }

            Some(event) = playback.recv() => {
                match event {
                    PlaybackEvent::Draw { sequence, image } => {
                        let views: Vec<String> = animators
                            .iter()
                            .map(|(key, animator)| {
                                let view = animator.current();
                                format!("{key}@{:.1}/{:.1}/{:.1}", view.pitch, view.yaw, view.fov)
                            })
                            .collect();
                        tracing::info!(
                            sequence = sequence,
                            width = image.width,
                            height = image.height,
                            views = ?views,
                            "Draw"
                        );
                    }
                    PlaybackEvent::Dry(dry) => {
                        tracing::info!(dry = dry, "Playback");
                    }
                    PlaybackEvent::Stats(stats) => {
                        tracing::info!(
                            displayed = stats.displayed,
                            dropped = stats.total_dropped(),
                            latency_ms = stats.average_latency_ms(),
                            "Playback stats"
                        );
                    }
                }
            }

            _ = ticker.tick() => {
                for animator in animators.values_mut() {
                    animator.tick(ANIMATION_TICK);
                }
            }

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    player.stop();
    client.stop_stream(&device).await.ok();
    client.close().await?;
    Ok(())
}

fn start_player(
    delay_ms: u64,
    instrument: bool,
) -> (Player, mpsc::Receiver<PlaybackEvent<JpegImage>>) {
    let config = PlaybackConfig::new()
        .display_delay_ms(delay_ms)
        .instrument(instrument);
    Player::spawn(config, JpegDecoder)
}
