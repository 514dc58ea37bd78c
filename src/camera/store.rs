//! Shared camera targets
//!
//! Single source of truth for the target orientation of every camera.
//! Concurrent controllers are resolved last-write-wins; every accepted
//! update is broadcast to all viewers, including the one that sent it, so
//! each client-side animator converges to the same target.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::error::{CameraError, ConfigError};

use super::orientation::{Orientation, Target};
use super::settings::CameraSettings;

/// Default capacity of the target broadcast channel
pub const DEFAULT_TARGET_CAPACITY: usize = 64;

/// Broadcast payload for a camera target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetUpdate {
    pub camera: String,
    pub to: Orientation,
    pub jump: bool,
    /// Sent as part of the initial sync of a new viewer
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub init: bool,
}

impl TargetUpdate {
    pub fn target(&self) -> Target {
        Target::new(self.to, self.jump)
    }
}

struct CameraEntry {
    settings: Arc<CameraSettings>,
    target: Target,
}

/// Registry of cameras and their current targets
pub struct OrientationStore {
    cameras: RwLock<HashMap<String, CameraEntry>>,
    tx: broadcast::Sender<TargetUpdate>,
}

impl OrientationStore {
    /// Create an empty store
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            cameras: RwLock::new(HashMap::new()),
            tx,
        }
    }

    /// Create a store holding every camera of the configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let store = Self::new(DEFAULT_TARGET_CAPACITY);
        for camera in config.cameras() {
            store.insert(CameraSettings::from_config(camera)?);
        }
        Ok(store)
    }

    /// Add a camera, its initial orientation becomes the target
    pub fn insert(&self, settings: CameraSettings) {
        let target = Target::new(settings.initial, true);
        self.cameras.write().insert(
            settings.key.clone(),
            CameraEntry {
                settings: Arc::new(settings),
                target,
            },
        );
    }

    pub fn settings(&self, camera: &str) -> Option<Arc<CameraSettings>> {
        self.cameras.read().get(camera).map(|e| Arc::clone(&e.settings))
    }

    pub fn target(&self, camera: &str) -> Option<Target> {
        self.cameras.read().get(camera).map(|e| e.target)
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.read().len()
    }

    /// Replace the target of a camera and broadcast it
    ///
    /// Rejected commands (unknown camera, out of range values) change
    /// nothing and are not broadcast.
    pub fn set_target(
        &self,
        camera: &str,
        orientation: Orientation,
        jump: bool,
    ) -> Result<Target, CameraError> {
        let update = {
            let mut cameras = self.cameras.write();
            let entry = cameras
                .get_mut(camera)
                .ok_or_else(|| CameraError::UnknownCamera(camera.to_string()))?;

            let to = entry.settings.validate(orientation).inspect_err(|e| {
                tracing::warn!(camera = camera, error = %e, "Camera target rejected");
            })?;

            entry.target = Target::new(to, jump);

            // Sent under the lock so broadcast order matches write order
            let update = TargetUpdate {
                camera: camera.to_string(),
                to,
                jump,
                init: false,
            };
            let receivers = self.tx.send(update.clone()).unwrap_or(0);

            tracing::debug!(
                camera = camera,
                pitch = to.pitch,
                yaw = to.yaw,
                fov = ?to.fov,
                jump = jump,
                receivers = receivers,
                "Camera target updated"
            );
            update
        };

        Ok(update.target())
    }

    /// Receive every accepted target update
    pub fn subscribe(&self) -> broadcast::Receiver<TargetUpdate> {
        self.tx.subscribe()
    }

    /// Current targets of all cameras, flagged for initial sync
    ///
    /// Initial targets always jump: a new viewer has nothing to animate from.
    pub fn snapshot(&self) -> Vec<TargetUpdate> {
        let cameras = self.cameras.read();
        let mut updates: Vec<TargetUpdate> = cameras
            .iter()
            .map(|(key, entry)| TargetUpdate {
                camera: key.clone(),
                to: entry.target.to,
                jump: true,
                init: true,
            })
            .collect();
        updates.sort_by(|a, b| a.camera.cmp(&b.camera));
        updates
    }
}

impl Default for OrientationStore {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_CAPACITY)
    }
}
