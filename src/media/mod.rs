//! Media types
//!
//! This module provides:
//! - The immutable [`Frame`] passed from ingest to playback
//! - Quality [`Tier`]s
//! - The default JPEG frame decoder

pub mod frame;
pub mod jpeg;

pub use frame::{now_millis, Frame, Tier};
pub use jpeg::{JpegImage, JpegDecoder};
