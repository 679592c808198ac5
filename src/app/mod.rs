pub mod config;
pub mod logging;

pub use config::{Config, ConfigError, LogLevel};
pub use logging::{LoggingError, LoggingSystem, setup_logging};

use crate::domain::MetricSnapshot;
use crate::encoder::LineProtocolEncoder;
use crate::publisher::Publisher;
use crate::sender::HttpSink;
use crate::timestamp::TimestampSource;
use anyhow::Context;
use std::process;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

/// Outcome counters of one replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub published: u64,
    pub failed: u64,
    pub skipped_lines: u64,
}

/// Replays NDJSON snapshots into the database at the configured period.
pub struct App {
    config: Config,
    publisher: Publisher<HttpSink>,
}

impl App {
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let sink = HttpSink::new(config.client_config()).context("building HTTP sink")?;
        let tags = config.parsed_tags()?;

        let publisher = Publisher::new(
            sink,
            config.server_info(),
            TimestampSource::new(config.timestamp_policy),
        )
        .with_measurement(config.measurement.clone())
        .with_tags(tags)
        .with_encoder(LineProtocolEncoder::new(config.significant_digits));

        Ok(Self { config, publisher })
    }

    pub fn publisher(&self) -> &Publisher<HttpSink> {
        &self.publisher
    }

    pub async fn run(self) -> anyhow::Result<RunSummary> {
        if let Err(e) = self
            .publisher
            .sink()
            .health_check(self.publisher.server_info())
            .await
        {
            warn!("InfluxDB health check failed, publishing anyway: {}", e);
        }

        if self.config.input.as_os_str() == "-" {
            let reader = BufReader::new(tokio::io::stdin());
            self.run_with_reader(reader).await
        } else {
            let file = tokio::fs::File::open(&self.config.input)
                .await
                .with_context(|| format!("opening {}", self.config.input.display()))?;
            self.run_with_reader(BufReader::new(file)).await
        }
    }

    /// Publish one snapshot per period until the input ends or Ctrl+C.
    pub async fn run_with_reader<R>(self, reader: R) -> anyhow::Result<RunSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut summary = RunSummary::default();
        let mut lines = reader.lines();
        let mut ticker = interval(Duration::from_micros(self.config.period_usec as u64));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!(
            "Replaying snapshots every {}us into bucket '{}'",
            self.config.period_usec, self.config.influxdb_bucket
        );

        loop {
            let line = tokio::select! {
                _ = &mut shutdown => {
                    info!("Received Ctrl+C, stopping");
                    break;
                }
                line = lines.next_line() => line.context("reading snapshot input")?,
            };
            let Some(line) = line else {
                debug!("Snapshot input exhausted");
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let snapshot: MetricSnapshot = match serde_json::from_str(&line) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Skipping malformed snapshot: {}", e);
                    summary.skipped_lines += 1;
                    continue;
                }
            };

            ticker.tick().await;
            match self
                .publisher
                .publish(&snapshot, self.config.period_usec)
                .await
            {
                Ok(n_reports) => {
                    summary.published += 1;
                    debug!("Report {} sent", n_reports);
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!("Publish failed: {}", e);
                }
            }
        }

        self.publisher.stop();
        info!(
            "Replay finished: {} published, {} failed, {} skipped",
            summary.published, summary.failed, summary.skipped_lines
        );
        Ok(summary)
    }
}

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// Main entry point for the application
pub async fn main() -> anyhow::Result<()> {
    let config = match Config::load(std::env::args_os()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(2);
        }
    };

    if let Err(e) = setup_logging(config.log_level) {
        eprintln!("Warning: {e}");
    }

    info!("Starting ue-metrics-influx v{}", get_version());

    let app = App::from_config(config)?;
    match app.run().await {
        Ok(summary) if summary.failed > 0 => {
            warn!("{} samples were dropped", summary.failed);
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e) => {
            error!("Application error: {:#}", e);
            process::exit(1);
        }
    }
}
