use thiserror::Error;

/// A value in the snapshot or measurement could not be rendered as line protocol.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("Non-finite value for '{field}': {value}")]
    NonFinite { field: String, value: f64 },

    #[error("Zero elapsed time for user {user}, cannot derive a rate")]
    ZeroDuration { user: usize },

    #[error("Per-user collections disagree: {mac} MAC entries vs {rrc} RRC entries")]
    MismatchedUsers { mac: usize, rrc: usize },

    #[error("Snapshot has no {direction} carrier metrics")]
    MissingCarrier { direction: &'static str },

    #[error("Invalid character in {what} '{value}'")]
    InvalidCharacter { what: &'static str, value: String },

    #[error("Empty {what}")]
    Empty { what: &'static str },

    #[error("Measurement '{0}' has no fields")]
    NoFields(String),
}

/// Outcome of a failed publish cycle.
///
/// `Display` yields the diagnostic text handed back to the metrics producer
/// for logging.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Invalid reporting period: {period_usec}us")]
    InvalidPeriod { period_usec: u32 },

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Transport error{}: {message}", status_suffix(.status))]
    Transport { status: Option<u16>, message: String },

    #[error("Publisher is stopped")]
    Stopped,
}

impl PublishError {
    pub fn is_transport(&self) -> bool {
        matches!(self, PublishError::Transport { .. })
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}
