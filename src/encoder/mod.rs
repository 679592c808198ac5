pub mod float;
pub mod line_protocol;

pub use float::{DEFAULT_SIGNIFICANT_DIGITS, encode_float, float_precision};
pub use line_protocol::{LineProtocolEncoder, encode_line_protocol};
