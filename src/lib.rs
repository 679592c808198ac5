#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_lossless,            // Infallible casts are clear enough with `as`
    clippy::cast_possible_truncation, // Precision math stays within a few hundred digits
    clippy::cast_possible_wrap,       // Counters are far below i64::MAX
    clippy::cast_precision_loss,      // Byte counters are converted to rates
    clippy::cast_sign_loss,           // Clamped to zero before the cast
    clippy::missing_errors_doc,       // Internal API
    clippy::missing_panics_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. EncodingError in encoder module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

pub mod app;
pub mod builder;
pub mod domain;
pub mod encoder;
pub mod publisher;
pub mod sender;
pub mod timestamp;

// Re-export main types for easy access
pub use app::{App, Config};
pub use builder::MeasurementBuilder;
pub use domain::{EncodingError, FieldValue, Measurement, MetricSnapshot, PublishError};
pub use encoder::{LineProtocolEncoder, encode_float, encode_line_protocol};
pub use publisher::{PublishPhase, Publisher};
pub use sender::{HttpSink, LineProtocolSink, ServerInfo, SinkResponse};
pub use timestamp::{TimestampPolicy, TimestampSource};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
