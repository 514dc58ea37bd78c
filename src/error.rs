//! Error types
//!
//! Each area has its own error enum; [`Error`] wraps them for callers that
//! cross area boundaries (server startup, client connection).

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Registry error: {0}")]
    Registry(#[from] crate::registry::RegistryError),

    #[error("Connection closed")]
    ConnectionClosed,
}

/// Deployment configuration errors. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid {kind} key {key:?}: only alpha-numerical characters and underscores are allowed")]
    InvalidKey { kind: &'static str, key: String },

    #[error("Duplicate {kind} key {key:?}")]
    DuplicateKey { kind: &'static str, key: String },

    #[error("Invalid pipe prefix {0}: must be an existing directory")]
    InvalidPipePrefix(PathBuf),

    #[error("Camera {camera}: invalid fov bounds min={min} max={max}")]
    InvalidFovBounds { camera: String, min: f64, max: f64 },

    #[error("Camera {camera}: invalid auto-fov step (pitch={pitch}, fov={fov})")]
    InvalidAutoFovStep { camera: String, pitch: f64, fov: f64 },

    #[error("Camera {camera}: invalid initial orientation: {source}")]
    InvalidInitialOrientation {
        camera: String,
        #[source]
        source: CameraError,
    },
}

/// Rejected camera commands
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("Unknown camera {0:?}")]
    UnknownCamera(String),

    #[error("Pitch {0} outside [-90, 90]")]
    PitchOutOfRange(f64),

    #[error("Yaw {0} is not a finite angle")]
    InvalidYaw(f64),

    #[error("Fov {fov} outside [{min}, {max}]")]
    FovOutOfRange { fov: f64, min: f64, max: f64 },
}

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Message of {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("Malformed message: {0}")]
    Malformed(&'static str),

    #[error("Unknown event {0:?}")]
    UnknownEvent(String),

    #[error("Invalid {event} payload: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Frame decode failures. Counted by the playback buffer, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Payload is not a JPEG image")]
    NotJpeg,

    #[error("JPEG data truncated")]
    Truncated,

    #[error("Decoder failed: {0}")]
    Backend(String),
}
