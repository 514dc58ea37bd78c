//! State shared by every connection

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::camera::OrientationStore;
use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::media::Tier;
use crate::protocol::{AppState, ConfigPayload, DeviceState, ServerMessage};
use crate::registry::{Distributor, StreamKey};
use crate::stats::ServerStats;

/// Registries and process-wide flags, passed to each connection
pub struct Hub {
    app: AppConfig,
    config_payload: ConfigPayload,
    distributor: Arc<Distributor>,
    cameras: Arc<OrientationStore>,
    debug: AtomicBool,
    device_states: RwLock<BTreeMap<String, DeviceState>>,
    device_tx: broadcast::Sender<DeviceState>,
    total_connections: AtomicU64,
    active_connections: AtomicU64,
}

impl Hub {
    /// Build the registries for a validated configuration
    ///
    /// Every device gets one stream per tier and a device state with an
    /// unknown battery level.
    pub fn new(app: AppConfig) -> Result<Self, ConfigError> {
        let cameras = OrientationStore::from_config(&app)?;
        let distributor = Distributor::new();
        let mut device_states = BTreeMap::new();

        for device in &app.devices {
            for tier in Tier::ALL {
                distributor.register_stream(StreamKey::new(device.key.as_str(), tier));
            }
            device_states.insert(device.key.clone(), DeviceState::new(device.key.as_str()));
        }

        let (device_tx, _) = broadcast::channel(16);

        Ok(Self {
            config_payload: ConfigPayload::from_app(&app),
            app,
            distributor: Arc::new(distributor),
            cameras: Arc::new(cameras),
            debug: AtomicBool::new(false),
            device_states: RwLock::new(device_states),
            device_tx,
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
        })
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    pub fn distributor(&self) -> &Arc<Distributor> {
        &self.distributor
    }

    pub fn cameras(&self) -> &Arc<OrientationStore> {
        &self.cameras
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            debug: self.debug.load(Ordering::Relaxed),
        }
    }

    /// Toggle the debug flag shared by all viewers
    pub fn set_debug(&self, enabled: bool) -> AppState {
        self.debug.store(enabled, Ordering::Relaxed);
        tracing::info!(debug = enabled, "Debug flag changed");
        self.app_state()
    }

    /// Store and broadcast the state of a device
    ///
    /// Called by the deployment's telemetry source, nothing inside the
    /// server produces device states. Unknown devices are ignored.
    pub fn set_device_state(&self, state: DeviceState) {
        {
            let mut states = self.device_states.write();
            let Some(slot) = states.get_mut(&state.device) else {
                tracing::warn!(device = %state.device, "State for unknown device ignored");
                return;
            };
            if *slot == state {
                return;
            }
            *slot = state.clone();
        }

        tracing::debug!(device = %state.device, battery = ?state.battery, "Device state changed");
        let _ = self.device_tx.send(state);
    }

    pub fn device_states(&self) -> Vec<DeviceState> {
        self.device_states.read().values().cloned().collect()
    }

    pub fn subscribe_devices(&self) -> broadcast::Receiver<DeviceState> {
        self.device_tx.subscribe()
    }

    /// Messages every viewer gets right after connecting
    pub fn initial_sync(&self) -> Vec<ServerMessage> {
        let mut messages = vec![
            ServerMessage::Config(self.config_payload.clone()),
            ServerMessage::App(self.app_state()),
        ];
        messages.extend(
            self.cameras
                .snapshot()
                .into_iter()
                .map(ServerMessage::CameraTarget),
        );
        messages.extend(
            self.device_states()
                .into_iter()
                .map(ServerMessage::DeviceState),
        );
        messages
    }

    pub(crate) fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            streams: self.distributor.stream_count() as u64,
            cameras: self.cameras.camera_count() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Fov;

    const CONFIG: &str = r#"{
        "pipe-prefix": "/tmp",
        "devices": [
            {"key": "theta", "type": "theta", "width": 3840, "height": 1920,
             "cameras": [{"key": "main"}, {"key": "side", "fov": "auto"}]},
            {"key": "clip", "type": "playback", "uri": "file:///clip.mp4", "width": 1920, "height": 960}
        ]
    }"#;

    fn hub() -> Hub {
        Hub::new(AppConfig::from_json(CONFIG).unwrap()).unwrap()
    }

    #[test]
    fn test_streams_registered_per_tier() {
        let hub = hub();
        let stats = hub.stats();

        assert_eq!(stats.streams, 4);
        assert_eq!(stats.cameras, 2);
        assert!(hub
            .distributor()
            .stream_exists(&StreamKey::new("clip", Tier::Original)));
    }

    #[test]
    fn test_initial_sync_order() {
        let hub = hub();
        let events: Vec<&str> = hub.initial_sync().iter().map(ServerMessage::event).collect();

        assert_eq!(
            events,
            vec![
                "config",
                "app",
                "camera-target",
                "camera-target",
                "device-state",
                "device-state"
            ]
        );

        match &hub.initial_sync()[3] {
            ServerMessage::CameraTarget(update) => {
                assert_eq!(update.camera, "side");
                assert_eq!(update.to.fov, Fov::Auto);
                assert!(update.init && update.jump);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_debug_flag() {
        let hub = hub();
        assert!(!hub.app_state().debug);
        assert!(hub.set_debug(true).debug);
        assert!(hub.app_state().debug);
    }

    #[test]
    fn test_device_state_broadcast() {
        let hub = hub();
        let mut rx = hub.subscribe_devices();

        hub.set_device_state(DeviceState {
            device: "theta".into(),
            battery: Some(80.0),
        });
        // Same state again is not re-sent
        hub.set_device_state(DeviceState {
            device: "theta".into(),
            battery: Some(80.0),
        });
        hub.set_device_state(DeviceState::new("unknown"));

        assert_eq!(rx.try_recv().unwrap().battery, Some(80.0));
        assert!(rx.try_recv().is_err());

        let states = hub.device_states();
        assert_eq!(states.len(), 2);
        assert_eq!(states[1].device, "theta");
    }

    #[test]
    fn test_device_states_unknown_until_fed() {
        let hub = hub();
        assert!(hub.device_states().iter().all(|s| s.battery.is_none()));

        hub.set_device_state(DeviceState {
            device: "theta".into(),
            battery: Some(12.5),
        });
        let fed = hub
            .device_states()
            .into_iter()
            .find(|s| s.device == "theta")
            .unwrap();
        assert_eq!(fed.battery, Some(12.5));
    }
}
