//! Feed server example
//!
//! Run with: cargo run --example feed_server <CONFIG> [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example feed_server config.json                  # binds to the address in the config
//!   cargo run --example feed_server config.json 127.0.0.1:8001   # overrides the bind address
//!
//! ## Feeding frames
//!
//! The capture pipeline writes JPEG images into one named pipe per device and
//! tier, `<pipe-prefix>/pipe-<device>-<tier>`. The server creates missing
//! pipes on startup. By hand:
//!
//!   cat image.jpg > /tmp/feeds/pipe-theta_1-low
//!
//! ## Architecture
//!
//! ```text
//!   capture ──► pipe-theta_1-low      ──► FrameAssembler ──┐
//!   capture ──► pipe-theta_1-original ──► FrameAssembler ──┤
//!                                                          ▼
//!                                                     Distributor ──► viewers (TCP)
//!                                                          ▲
//!   viewers ──► camera targets ──► OrientationStore ───────┘ (broadcast)
//! ```

use std::net::SocketAddr;

use spherecast::{AppConfig, FeedServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spherecast=info".parse()?)
                .add_directive("feed_server=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .ok_or("usage: feed_server <CONFIG> [BIND_ADDR]")?;

    let app = AppConfig::load(&config_path)?;

    let bind_addr: SocketAddr = match args.next() {
        Some(addr) => addr.parse()?,
        None => app.bind,
    };

    tracing::info!(
        config = %config_path,
        devices = app.devices.len(),
        "Loaded configuration"
    );

    // ========================================================================
    // Server
    // ========================================================================

    let server = FeedServer::new(ServerConfig::with_addr(bind_addr), app)?;

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let stats = server.hub().stats();
    tracing::info!(
        total_connections = stats.total_connections,
        "Feed server stopped"
    );

    Ok(())
}
