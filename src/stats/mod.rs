//! Statistics and metrics

pub mod metrics;

pub use metrics::{PipeStats, ServerStats, ThroughputReport};
