//! Per-device ingest tasks

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::DeviceConfig;
use crate::ingest::{FifoChannel, FrameAssembler, FrameChannel};
use crate::media::Tier;
use crate::registry::{Distributor, StreamKey};

use super::config::ServerConfig;

/// Ingest for every tier of one device
///
/// Starting and stopping the capture process is left to the deployment;
/// the runtime only reads what it writes into the pipes. Dropping the
/// runtime stops the tasks.
pub struct DeviceRuntime {
    key: String,
    tasks: Vec<JoinHandle<()>>,
}

impl DeviceRuntime {
    /// Start reading the pipes of `device`
    pub fn start(
        device: &DeviceConfig,
        pipe_prefix: &Path,
        config: &ServerConfig,
        distributor: Arc<Distributor>,
    ) -> Self {
        let tasks = Tier::ALL
            .iter()
            .map(|&tier| {
                let key = StreamKey::new(device.key.as_str(), tier);
                distributor.register_stream(key.clone());

                let rx = FifoChannel::new(device.pipe_path(pipe_prefix, tier))
                    .chunk_size(config.chunk_size)
                    .reconnect_interval(config.reconnect_interval)
                    .open();

                tokio::spawn(FrameAssembler::new(config.chunk_size).run(
                    key,
                    rx,
                    Arc::clone(&distributor),
                    config.stats_interval,
                ))
            })
            .collect();

        tracing::info!(device = %device.key, kind = ?device.kind, "Device started");

        Self {
            key: device.key.clone(),
            tasks,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for DeviceRuntime {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        tracing::info!(device = %self.key, "Device stopped");
    }
}
