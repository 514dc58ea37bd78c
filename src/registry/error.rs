//! Registry error types

use thiserror::Error;

use super::frame::StreamKey;

/// Error type for distributor operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No device publishes this stream
    #[error("Stream not found: {0}")]
    StreamNotFound(StreamKey),
}
