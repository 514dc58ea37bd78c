//! Per-camera settings resolved from configuration

use crate::config::CameraConfig;
use crate::error::{CameraError, ConfigError};

use super::auto_fov::AutoFovTable;
use super::orientation::{Fov, Orientation, ViewAngles};

/// Immutable description of a camera
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    pub key: String,
    /// Output aspect ratio (width / height)
    pub ratio: f64,
    pub min_fov: f64,
    pub max_fov: f64,
    pub auto_fov: AutoFovTable,
    /// Target before any command is received
    pub initial: Orientation,
}

impl CameraSettings {
    /// Validate a camera config
    pub fn from_config(config: &CameraConfig) -> Result<Self, ConfigError> {
        let (min, max) = (config.min_fov, config.max_fov);
        if !(min.is_finite() && max.is_finite() && min > 0.0 && min <= max) {
            return Err(ConfigError::InvalidFovBounds {
                camera: config.key.clone(),
                min,
                max,
            });
        }

        for step in &config.auto_fov {
            let valid = step.pitch.is_finite()
                && (0.0..=90.0).contains(&step.pitch)
                && step.fov.is_finite()
                && step.fov > 0.0;
            if !valid {
                return Err(ConfigError::InvalidAutoFovStep {
                    camera: config.key.clone(),
                    pitch: step.pitch,
                    fov: step.fov,
                });
            }
        }

        let settings = Self {
            key: config.key.clone(),
            ratio: config.ratio,
            min_fov: min,
            max_fov: max,
            auto_fov: AutoFovTable::new(config.auto_fov.clone()),
            initial: Orientation::new(config.pitch, config.yaw, config.fov),
        };

        let initial = settings
            .validate(settings.initial)
            .map_err(|source| ConfigError::InvalidInitialOrientation {
                camera: config.key.clone(),
                source,
            })?;

        Ok(Self { initial, ..settings })
    }

    /// Check an orientation command, returning it with yaw normalized
    pub fn validate(&self, orientation: Orientation) -> Result<Orientation, CameraError> {
        let Orientation { pitch, yaw, fov } = orientation;

        if !(-90.0..=90.0).contains(&pitch) {
            return Err(CameraError::PitchOutOfRange(pitch));
        }
        if !yaw.is_finite() {
            return Err(CameraError::InvalidYaw(yaw));
        }
        if let Fov::Fixed(value) = fov {
            if !(self.min_fov..=self.max_fov).contains(&value) {
                return Err(CameraError::FovOutOfRange {
                    fov: value,
                    min: self.min_fov,
                    max: self.max_fov,
                });
            }
        }

        Ok(orientation.normalized())
    }

    /// Fov for `pitch` from the auto-zoom table, `min_fov` if there is none
    pub fn auto_fov(&self, pitch: f64) -> f64 {
        self.auto_fov.resolve(pitch).unwrap_or(self.min_fov)
    }

    /// Replace an automatic fov with its absolute value
    pub fn resolve(&self, orientation: &Orientation) -> ViewAngles {
        let fov = match orientation.fov {
            Fov::Fixed(fov) => fov,
            Fov::Auto => self.auto_fov(orientation.pitch),
        };
        ViewAngles::new(orientation.pitch, orientation.yaw, fov)
    }
}
