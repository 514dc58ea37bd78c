//! Virtual cameras
//!
//! Server side, [`OrientationStore`] holds the authoritative target of every
//! camera and broadcasts changes. Client side, [`OrientationAnimator`] turns
//! those targets into a continuously interpolated orientation for rendering.
//!
//! ```text
//!   camera-target ──► OrientationStore::set_target ──► broadcast ──► every viewer
//!                                                                    │
//!                                          OrientationAnimator::set_target
//!                                                                    │
//!                                          tick(Δt) ──► ViewAngles ──► renderer
//! ```

pub mod animator;
pub mod auto_fov;
pub mod orientation;
pub mod settings;
pub mod store;

pub use animator::OrientationAnimator;
pub use auto_fov::{AutoFovStep, AutoFovTable};
pub use orientation::{normalize_yaw, Fov, Orientation, Target, ViewAngles};
pub use settings::CameraSettings;
pub use store::{OrientationStore, TargetUpdate};
