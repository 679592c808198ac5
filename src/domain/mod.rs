//! Domain layer for ue-metrics-influx.
//!
//! Contains the canonical types shared across all modules:
//! - `MetricSnapshot`: The caller-owned counters sampled once per period
//! - `Measurement`: One timestamped line-protocol record
//! - `EncodingError` / `PublishError`: Error types surfaced to the caller

pub mod error;
pub mod measurement;
pub mod snapshot;

pub use error::{EncodingError, PublishError};
pub use measurement::{FieldValue, Measurement};
pub use snapshot::{
    MacUserMetrics, MetricSnapshot, PhyDlMetrics, PhyMetrics, PhyUlMetrics, RrcUserMetrics,
    StackMetrics, SysMetrics,
};
