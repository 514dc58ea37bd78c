//! # spherecast
//!
//! Live 360° video distribution with a shared, remotely steerable virtual camera.
//!
//! The crate covers the real-time core of the system:
//!
//! - **Ingest**: turn the byte stream of an external capture pipeline (one named
//!   pipe per device and quality tier) into discrete, timestamped frames
//! - **Distribution**: fan every assembled frame out to the viewers subscribed to
//!   that stream, without letting a slow viewer hold up the others
//! - **Playback**: a fixed-delay jitter buffer that decodes off the critical path,
//!   drops under backlog and exposes the single frame to show "now"
//! - **Camera sync**: a last-write-wins store of camera targets broadcast to every
//!   viewer, and a client-side animator that tracks the shared target smoothly
//!
//! ```text
//! capture ──► FifoChannel ──► FrameAssembler ──► Distributor ──► FeedClient ──► Player
//! control ──► OrientationStore ──(broadcast)──► FeedClient ──► OrientationAnimator
//! ```
//!
//! # Running a server
//!
//! ```no_run
//! use spherecast::{AppConfig, FeedServer, ServerConfig};
//!
//! # async fn example() -> spherecast::error::Result<()> {
//! let app = AppConfig::load("config.json")?;
//! let config = ServerConfig::default().bind(app.bind);
//! let server = FeedServer::new(config, app)?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod camera;
pub mod client;
pub mod config;
pub mod error;
pub mod ingest;
pub mod media;
pub mod playback;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;

pub use camera::{Fov, Orientation, OrientationAnimator, OrientationStore, Target, ViewAngles};
pub use client::FeedClient;
pub use config::AppConfig;
pub use media::{Frame, Tier};
pub use playback::{PlaybackBuffer, PlaybackConfig, Player};
pub use registry::{Distributor, StreamKey};
pub use server::{FeedServer, ServerConfig};
