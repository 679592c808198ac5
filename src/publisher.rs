//! One publish cycle per reporting period: timestamp, build, encode, send.
//!
//! Shared state (timestamp cursor and report counter) is guarded by a single
//! mutex that is only held for the read-modify-write of those values. The
//! network round trip runs without the lock, so a slow database never blocks
//! a concurrent caller from advancing the cursor.

use crate::builder::MeasurementBuilder;
use crate::domain::{MetricSnapshot, PublishError};
use crate::encoder::LineProtocolEncoder;
use crate::sender::{LineProtocolSink, ServerInfo};
use crate::timestamp::{TimestampPolicy, TimestampSource};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Observable lifecycle of the publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishPhase {
    /// No publish in flight.
    Idle,
    /// At least one request has been handed to the sink and not yet answered.
    Publishing,
    /// A result has just been delivered. Transient: the call returns to idle
    /// as it hands back its result, so `phase()` never reports it and it
    /// only appears as a log marker when the last in-flight request ends.
    Reported,
}

#[derive(Debug)]
struct PublisherState {
    clock: TimestampSource,
    n_reports: u64,
}

/// Periodic UE metrics publisher.
#[derive(Debug)]
pub struct Publisher<S> {
    sink: S,
    server: ServerInfo,
    measurement: String,
    tags: BTreeMap<String, String>,
    builder: MeasurementBuilder,
    encoder: LineProtocolEncoder,
    state: Mutex<PublisherState>,
    in_flight: AtomicUsize,
    stopped: AtomicBool,
}

impl<S: LineProtocolSink> Publisher<S> {
    pub fn new(sink: S, server: ServerInfo, clock: TimestampSource) -> Self {
        info!(
            "Publishing to {}:{} (org={}, bucket={}), timestamp policy: {}",
            server.host,
            server.port,
            server.org,
            server.bucket,
            clock.policy()
        );

        Self {
            sink,
            server,
            measurement: "ue_info".to_string(),
            tags: BTreeMap::new(),
            builder: MeasurementBuilder::new(),
            encoder: LineProtocolEncoder::default(),
            state: Mutex::new(PublisherState {
                clock,
                n_reports: 0,
            }),
            in_flight: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    /// Name of the summary measurement (defaults to `ue_info`).
    pub fn with_measurement(mut self, name: impl Into<String>) -> Self {
        self.measurement = name.into();
        self
    }

    /// Tags attached to every record.
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_encoder(mut self, encoder: LineProtocolEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Publish one snapshot covering `period_usec` microseconds.
    ///
    /// Returns the number of reports sent so far, including this one. The
    /// timestamp cursor advances even when the send fails, so a sample is
    /// never re-stamped with a time already used.
    pub async fn publish(
        &self,
        snapshot: &MetricSnapshot,
        period_usec: u32,
    ) -> Result<u64, PublishError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(PublishError::Stopped);
        }
        if period_usec == 0 {
            warn!("Rejected publish with a zero reporting period");
            return Err(PublishError::InvalidPeriod { period_usec });
        }

        let timestamp = self
            .state
            .lock()
            .clock
            .next_timestamp(Duration::from_micros(period_usec as u64))?;

        let body = self
            .builder
            .build_set(&self.measurement, &self.tags, snapshot, timestamp)
            .and_then(|measurements| self.encoder.encode_batch(&measurements))
            .map_err(|e| {
                error!("Dropping sample at {}: {}", timestamp, e);
                PublishError::Encoding(e)
            })?;

        let _guard = InFlightGuard::enter(&self.in_flight);
        let response = self.sink.post(&self.server, &body).await.map_err(|e| {
            warn!("Failed to publish sample at {}: {}", timestamp, e);
            PublishError::Transport {
                status: None,
                message: e.to_string(),
            }
        })?;

        if !response.is_ack() {
            warn!(
                "Database rejected sample at {}: HTTP {} {}",
                timestamp,
                response.status,
                response.body.trim()
            );
            return Err(PublishError::Transport {
                status: Some(response.status),
                message: response.body,
            });
        }

        let n_reports = {
            let mut state = self.state.lock();
            state.n_reports += 1;
            state.n_reports
        };
        debug!("Published report {} at {}", n_reports, timestamp);
        Ok(n_reports)
    }

    /// Stop accepting publishes. Calls already in flight run to completion.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            let n_reports = self.state.lock().n_reports;
            info!("Publisher stopped after {} reports", n_reports);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// `Idle` or `Publishing`; see [`PublishPhase::Reported`].
    pub fn phase(&self) -> PublishPhase {
        if self.in_flight.load(Ordering::Acquire) > 0 {
            PublishPhase::Publishing
        } else {
            PublishPhase::Idle
        }
    }

    pub fn report_count(&self) -> u64 {
        self.state.lock().n_reports
    }

    /// Timestamp used by the most recent publish attempt.
    pub fn timestamp_cursor(&self) -> u64 {
        self.state.lock().clock.cursor()
    }

    pub fn timestamp_policy(&self) -> TimestampPolicy {
        self.state.lock().clock.policy()
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Marks a request as in flight until dropped, including when the publish
/// future itself is dropped mid-request.
struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self { counter }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.counter.fetch_sub(1, Ordering::AcqRel) == 1 {
            debug!("Publish cycle {:?}", PublishPhase::Reported);
        }
    }
}
