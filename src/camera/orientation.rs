//! Camera orientation model
//!
//! Angles follow the usual 360° viewer convention: pitch is positive upwards
//! within [-90, 90], yaw is positive to the right within (-180, 180] with 0 at
//! the centre of the source image, fov is the vertical field of view.

use serde::{Deserialize, Serialize};

/// Field of view request
///
/// `Auto` stays symbolic in targets and is resolved through the camera's
/// auto-zoom table right before any arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "FovRepr", into = "FovRepr")]
pub enum Fov {
    /// Explicit vertical fov in degrees
    Fixed(f64),
    /// Derived from pitch via the auto-zoom table
    Auto,
}

impl Fov {
    pub fn is_auto(&self) -> bool {
        matches!(self, Fov::Auto)
    }
}

#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum AutoKeyword {
    Auto,
}

/// JSON form: a number of degrees or the string `"auto"`
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum FovRepr {
    Fixed(f64),
    Auto(AutoKeyword),
}

impl From<FovRepr> for Fov {
    fn from(repr: FovRepr) -> Self {
        match repr {
            FovRepr::Fixed(fov) => Fov::Fixed(fov),
            FovRepr::Auto(AutoKeyword::Auto) => Fov::Auto,
        }
    }
}

impl From<Fov> for FovRepr {
    fn from(fov: Fov) -> Self {
        match fov {
            Fov::Fixed(fov) => FovRepr::Fixed(fov),
            Fov::Auto => FovRepr::Auto(AutoKeyword::Auto),
        }
    }
}

/// Requested orientation, possibly with an automatic fov
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub pitch: f64,
    pub yaw: f64,
    pub fov: Fov,
}

impl Orientation {
    pub fn new(pitch: f64, yaw: f64, fov: Fov) -> Self {
        Self { pitch, yaw, fov }
    }

    /// Same orientation with yaw in canonical range and pitch clamped
    pub fn normalized(self) -> Self {
        Self {
            pitch: clamp_pitch(self.pitch),
            yaw: normalize_yaw(self.yaw),
            fov: self.fov,
        }
    }
}

/// Fully resolved orientation, fov always numeric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewAngles {
    pub pitch: f64,
    pub yaw: f64,
    pub fov: f64,
}

impl ViewAngles {
    pub fn new(pitch: f64, yaw: f64, fov: f64) -> Self {
        Self { pitch, yaw, fov }
    }

    /// Angular pan distance to `other` along the shorter yaw path
    pub fn pan_distance(&self, other: &ViewAngles) -> f64 {
        let yaw = shortest_yaw(self.yaw, other.yaw) - self.yaw;
        let pitch = other.pitch - self.pitch;
        yaw.hypot(pitch)
    }
}

impl From<ViewAngles> for Orientation {
    fn from(angles: ViewAngles) -> Self {
        Self::new(angles.pitch, angles.yaw, Fov::Fixed(angles.fov))
    }
}

/// Authoritative desired orientation of a camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub to: Orientation,
    /// Snap immediately instead of animating
    #[serde(default)]
    pub jump: bool,
}

impl Target {
    pub fn new(to: Orientation, jump: bool) -> Self {
        Self { to, jump }
    }
}

/// Map any finite yaw into (-180, 180]
pub fn normalize_yaw(yaw: f64) -> f64 {
    let yaw = yaw % 360.0;
    if yaw <= -180.0 {
        yaw + 360.0
    } else if yaw > 180.0 {
        yaw - 360.0
    } else {
        yaw
    }
}

pub fn clamp_pitch(pitch: f64) -> f64 {
    pitch.clamp(-90.0, 90.0)
}

/// The equivalent of `target` (±360°) closest to `current`
pub fn shortest_yaw(current: f64, target: f64) -> f64 {
    [target, target + 360.0, target - 360.0]
        .into_iter()
        .min_by(|a, b| (a - current).abs().total_cmp(&(b - current).abs()))
        .unwrap_or(target)
}
