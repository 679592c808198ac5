use crate::domain::PublishError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How record timestamps are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampPolicy {
    /// Sample the real-time clock on every call.
    WallClock,
    /// Start from the wall clock once, then advance by exactly one reporting
    /// period per call.
    #[default]
    Accumulating,
}

impl std::fmt::Display for TimestampPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimestampPolicy::WallClock => f.write_str("wall-clock"),
            TimestampPolicy::Accumulating => f.write_str("accumulating"),
        }
    }
}

/// Produces non-decreasing nanosecond timestamps for published records.
#[derive(Debug, Clone)]
pub struct TimestampSource {
    policy: TimestampPolicy,
    cursor: u64,
}

impl TimestampSource {
    pub fn new(policy: TimestampPolicy) -> Self {
        Self {
            policy,
            cursor: wall_clock_nanos(),
        }
    }

    pub fn wall_clock() -> Self {
        Self::new(TimestampPolicy::WallClock)
    }

    pub fn accumulating() -> Self {
        Self::new(TimestampPolicy::Accumulating)
    }

    /// Accumulating source whose first call returns `epoch_ns + period`.
    pub fn accumulating_from(epoch_ns: u64) -> Self {
        Self {
            policy: TimestampPolicy::Accumulating,
            cursor: epoch_ns,
        }
    }

    pub fn policy(&self) -> TimestampPolicy {
        self.policy
    }

    /// Last timestamp handed out (or the initial epoch before the first call).
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn next_timestamp(&mut self, period: Duration) -> Result<u64, PublishError> {
        if period.is_zero() {
            return Err(PublishError::InvalidPeriod {
                period_usec: period.as_micros().min(u32::MAX as u128) as u32,
            });
        }

        self.cursor = match self.policy {
            // A clock stepped backwards repeats the previous value.
            TimestampPolicy::WallClock => wall_clock_nanos().max(self.cursor),
            TimestampPolicy::Accumulating => {
                let step = period.as_nanos().min(u64::MAX as u128) as u64;
                self.cursor.saturating_add(step)
            }
        };
        Ok(self.cursor)
    }
}

fn wall_clock_nanos() -> u64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .map_or(0, |nanos| nanos.max(0) as u64)
}
