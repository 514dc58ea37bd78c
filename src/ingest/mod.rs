//! Frame ingest from the capture pipeline
//!
//! Each (device, tier) pair has a named pipe. A [`FifoChannel`] reads it in
//! fixed-size chunks and a [`FrameAssembler`] turns the chunks back into
//! frames and hands them to the distributor.

pub mod assembler;
pub mod channel;

pub use assembler::FrameAssembler;
pub use channel::{ChannelEvent, FifoChannel, FrameChannel, DEFAULT_CHUNK_SIZE};
