//! Deployment configuration
//!
//! Loaded once at startup from a JSON file. Every validation failure is a
//! deployment error and aborts startup.
//!
//! ```json
//! {
//!   "pipe-prefix": "/var/run/spherecast",
//!   "bind": "0.0.0.0:8000",
//!   "devices": [{
//!     "key": "theta_1",
//!     "type": "theta",
//!     "width": 3840,
//!     "height": 1920,
//!     "delay": 300,
//!     "cameras": [{ "key": "main", "ratio": 1.7778, "auto-fov": [{"pitch": 0, "fov": 60}] }]
//!   }]
//! }
//! ```

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::camera::{AutoFovStep, CameraSettings, Fov};
use crate::error::ConfigError;
use crate::media::Tier;

/// Default playback delay in milliseconds
pub const DEFAULT_DELAY_MS: u64 = 250;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppConfig {
    /// Directory holding the named pipes written by the capture pipeline
    pub pipe_prefix: PathBuf,

    /// Address the feed server listens on
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    pub devices: Vec<DeviceConfig>,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

/// One capture device (one 360° source)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeviceConfig {
    pub key: String,

    #[serde(flatten)]
    pub kind: DeviceKind,

    pub width: u32,
    pub height: u32,

    #[serde(default)]
    pub crop: Crop,

    /// Client playback delay in milliseconds
    #[serde(default = "default_delay")]
    pub delay: u64,

    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
}

fn default_delay() -> u64 {
    DEFAULT_DELAY_MS
}

impl DeviceConfig {
    /// Path of the named pipe for one tier of this device
    pub fn pipe_path(&self, pipe_prefix: &Path, tier: Tier) -> PathBuf {
        pipe_prefix.join(format!("pipe-{}-{}", self.key, tier))
    }
}

/// Capture pipeline flavour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceKind {
    /// Live camera over USB
    Theta {
        #[serde(rename = "raw-record-path", default, skip_serializing_if = "Option::is_none")]
        raw_record_path: Option<PathBuf>,
    },
    /// File or network playback
    Playback {
        #[serde(default)]
        uri: String,
    },
}

/// Rows cropped from the source before encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    #[serde(default)]
    pub top: u32,
    #[serde(default)]
    pub bottom: u32,
}

/// One steerable virtual camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CameraConfig {
    pub key: String,

    #[serde(default = "default_ratio")]
    pub ratio: f64,

    #[serde(default)]
    pub pitch: f64,

    #[serde(default)]
    pub yaw: f64,

    #[serde(default = "default_fov")]
    pub fov: Fov,

    #[serde(default = "default_min_fov")]
    pub min_fov: f64,

    #[serde(default = "default_max_fov")]
    pub max_fov: f64,

    #[serde(default)]
    pub auto_fov: Vec<AutoFovStep>,
}

fn default_ratio() -> f64 {
    1.0
}

fn default_fov() -> Fov {
    Fov::Fixed(75.0)
}

fn default_min_fov() -> f64 {
    30.0
}

fn default_max_fov() -> f64 {
    120.0
}

impl AppConfig {
    /// Read, parse and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_json(&text)?;
        config.validate_paths()?;

        tracing::info!(
            path = %path.display(),
            devices = config.devices.len(),
            cameras = config.cameras().count(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Parse and validate everything that doesn't touch the filesystem
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate identifiers and camera settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut device_keys = HashSet::new();
        let mut camera_keys = HashSet::new();

        for device in &self.devices {
            validate_key("device", &device.key)?;
            if !device_keys.insert(device.key.as_str()) {
                return Err(ConfigError::DuplicateKey {
                    kind: "device",
                    key: device.key.clone(),
                });
            }

            for camera in &device.cameras {
                validate_key("camera", &camera.key)?;
                if !camera_keys.insert(camera.key.as_str()) {
                    return Err(ConfigError::DuplicateKey {
                        kind: "camera",
                        key: camera.key.clone(),
                    });
                }
                CameraSettings::from_config(camera)?;
            }
        }

        Ok(())
    }

    /// Check that the pipe prefix is an existing directory
    pub fn validate_paths(&self) -> Result<(), ConfigError> {
        if !self.pipe_prefix.is_dir() {
            return Err(ConfigError::InvalidPipePrefix(self.pipe_prefix.clone()));
        }
        Ok(())
    }

    /// Look up a device by key
    pub fn device(&self, key: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.key == key)
    }

    /// All cameras across all devices
    pub fn cameras(&self) -> impl Iterator<Item = &CameraConfig> {
        self.devices.iter().flat_map(|d| d.cameras.iter())
    }
}

/// Identifiers end up in pipe paths and wire events
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn validate_key(kind: &'static str, key: &str) -> Result<(), ConfigError> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(ConfigError::InvalidKey {
            kind,
            key: key.to_string(),
        })
    }
}
