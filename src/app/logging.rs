use super::config::LogLevel;
use parking_lot::RwLock;
use std::sync::Once;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("Failed to set global tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Builds the tracing filter and installs the global subscriber.
pub struct LoggingSystem {
    directives: RwLock<Vec<(String, LogLevel)>>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: RwLock::new(Vec::new()),
        }
    }

    pub fn add_directive(&self, target: &str, level: LogLevel) {
        self.directives.write().push((target.to_string(), level));
    }

    /// HTTP plumbing is noisy at debug level.
    pub fn add_default_directives(&self) {
        for target in ["hyper", "hyper_util", "reqwest", "h2", "rustls"] {
            self.add_directive(target, LogLevel::Warn);
        }
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let directives = self.directives.read();

        let mut filter_parts = Vec::with_capacity(directives.len() + 1);
        filter_parts.push(default_level.as_str().to_string());
        for (target, level) in directives.iter() {
            filter_parts.push(format!("{target}={}", level.as_str()));
        }

        filter_parts.join(",")
    }

    /// `RUST_LOG`, when set, replaces the generated filter.
    pub fn initialize_tracing(&self, default_level: LogLevel) -> Result<(), LoggingError> {
        let filter_string = std::env::var("RUST_LOG")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.build_filter_string(default_level));

        let env_filter =
            EnvFilter::try_new(&filter_string).map_err(|source| LoggingError::InvalidFilter {
                filter: filter_string.clone(),
                source,
            })?;

        let subscriber = tracing_subscriber::registry().with(env_filter).with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .compact(),
        );

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| LoggingError::SubscriberInit(e.to_string()))
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global subscriber once; later calls are no-ops.
pub fn setup_logging(level: LogLevel) -> Result<(), LoggingError> {
    static INIT: Once = Once::new();
    let mut result = Ok(());

    INIT.call_once(|| {
        let logging_system = LoggingSystem::new();
        logging_system.add_default_directives();
        result = logging_system.initialize_tracing(level);
    });

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_string_defaults() {
        let system = LoggingSystem::new();
        assert_eq!(system.build_filter_string(LogLevel::Debug), "debug");

        system.add_default_directives();
        let filter = system.build_filter_string(LogLevel::Info);
        assert!(filter.starts_with("info,"));
        assert!(filter.contains("reqwest=warn"));
        assert!(filter.contains("hyper=warn"));
    }

    #[test]
    fn test_filter_string_is_accepted_by_env_filter() {
        let system = LoggingSystem::new();
        system.add_default_directives();
        system.add_directive("ue_metrics_influx::publisher", LogLevel::Trace);

        let filter = system.build_filter_string(LogLevel::Warn);
        assert!(EnvFilter::try_new(&filter).is_ok());
    }
}
