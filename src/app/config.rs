use crate::sender::{ClientConfig, HttpSink, ServerInfo};
use crate::timestamp::TimestampPolicy;
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Largest digit budget that still maps onto distinct `f64` values.
const MAX_SIGNIFICANT_DIGITS: u32 = 17;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// InfluxDB host or base URL
    #[arg(long, env = "INFLUXDB_URL", default_value = "http://localhost")]
    pub influxdb_url: String,

    /// InfluxDB HTTP port
    #[arg(long, env = "INFLUXDB_PORT", default_value = "8086")]
    pub influxdb_port: u16,

    /// Organization owning the bucket
    #[arg(long, env = "INFLUXDB_ORG", default_value = "srs")]
    pub influxdb_org: String,

    /// API token (sent as `Authorization: Token ...`)
    #[arg(long, env = "INFLUXDB_TOKEN", default_value = "", hide_env_values = true)]
    pub influxdb_token: String,

    /// Target bucket
    #[arg(long, env = "INFLUXDB_BUCKET", default_value = "srsran")]
    pub influxdb_bucket: String,

    /// Name of the summary measurement
    #[arg(long, env = "MEASUREMENT", default_value = "ue_info")]
    pub measurement: String,

    /// Tag added to every record (repeatable)
    #[arg(long = "tag", value_name = "KEY=VALUE", env = "TAGS", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Identifier of this UE data stream (random UUID when unset)
    #[arg(long, env = "UE_DATA_IDENTIFIER")]
    pub ue_data_identifier: Option<String>,

    /// How record timestamps are derived
    #[arg(long, env = "TIMESTAMP_POLICY", value_enum, default_value = "accumulating")]
    pub timestamp_policy: TimestampPolicy,

    /// Significant digits kept for float fields
    #[arg(long, env = "SIGNIFICANT_DIGITS", default_value = "4")]
    pub significant_digits: u32,

    /// Reporting period in microseconds
    #[arg(long, env = "PERIOD_USEC", default_value = "1000000")]
    pub period_usec: u32,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "5")]
    pub request_timeout_secs: u64,

    /// Gzip request bodies
    #[arg(long, env = "ENABLE_COMPRESSION")]
    pub enable_compression: bool,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// NDJSON snapshot input, `-` for stdin
    #[arg(long, env = "INPUT", default_value = "-")]
    pub input: PathBuf,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Derived fields (not CLI arguments)
    #[serde(skip)]
    #[arg(skip)]
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            influxdb_url: "http://localhost".to_string(),
            influxdb_port: 8086,
            influxdb_org: "srs".to_string(),
            influxdb_token: String::new(),
            influxdb_bucket: "srsran".to_string(),
            measurement: "ue_info".to_string(),
            tags: Vec::new(),
            ue_data_identifier: None,
            timestamp_policy: TimestampPolicy::Accumulating,
            significant_digits: 4,
            period_usec: 1_000_000,
            request_timeout_secs: 5,
            enable_compression: false,
            log_level: LogLevel::Info,
            input: PathBuf::from("-"),
            config_file: None,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Config::parse_from(args);
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse CLI args (and env); a `--config-file` replaces them with the file
    /// contents.
    pub fn load<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::parse_from(args);
        match &config.config_file {
            Some(path) => Self::from_file(path),
            None => {
                let mut config = config;
                config.post_process()?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn post_process(&mut self) -> Result<(), ConfigError> {
        self.request_timeout = Duration::from_secs(self.request_timeout_secs);
        // Fixed for the lifetime of the process so every record carries the
        // same identifier.
        self.ue_data_identifier
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        HttpSink::base_url(&self.server_info()).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid InfluxDB URL '{}': {}",
                self.influxdb_url, e
            ))
        })?;

        if self.influxdb_port == 0 {
            return Err(ConfigError::InvalidConfig(
                "InfluxDB port must be greater than 0".to_string(),
            ));
        }
        if self.influxdb_org.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "InfluxDB organization must not be empty".to_string(),
            ));
        }
        if self.influxdb_bucket.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "InfluxDB bucket must not be empty".to_string(),
            ));
        }
        if self.measurement.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Measurement name must not be empty".to_string(),
            ));
        }
        if self.period_usec == 0 {
            return Err(ConfigError::InvalidConfig(
                "Reporting period must be greater than 0".to_string(),
            ));
        }
        if !(1..=MAX_SIGNIFICANT_DIGITS).contains(&self.significant_digits) {
            return Err(ConfigError::InvalidConfig(format!(
                "Significant digits must be between 1 and {MAX_SIGNIFICANT_DIGITS}, got {}",
                self.significant_digits
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        self.parsed_tags()?;
        Ok(())
    }

    pub fn server_info(&self) -> ServerInfo {
        ServerInfo::new(
            self.influxdb_url.clone(),
            self.influxdb_port,
            self.influxdb_org.clone(),
            self.influxdb_token.clone(),
            self.influxdb_bucket.clone(),
        )
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: self.request_timeout,
            enable_compression: self.enable_compression,
            ..ClientConfig::default()
        }
    }

    /// Explicit `--tag` values, the UE data identifier, and a `host` tag
    /// defaulting to the machine hostname.
    pub fn parsed_tags(&self) -> Result<BTreeMap<String, String>, ConfigError> {
        let mut tags = BTreeMap::new();

        for raw in &self.tags {
            let Some((key, value)) = raw.split_once('=') else {
                return Err(ConfigError::InvalidConfig(format!(
                    "Tag '{raw}' must have the form key=value"
                )));
            };
            if key.is_empty() || value.is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "Tag '{raw}' has an empty key or value"
                )));
            }
            if key.ends_with('\\') || value.ends_with('\\') {
                return Err(ConfigError::InvalidConfig(format!(
                    "Tag '{raw}' must not end a key or value with a backslash"
                )));
            }
            tags.insert(key.to_string(), value.to_string());
        }

        if let Some(identifier) = &self.ue_data_identifier {
            tags.entry("ue_data_identifier".to_string())
                .or_insert_with(|| identifier.clone());
        }

        if !tags.contains_key("host")
            && let Some(host) = hostname::get().ok().and_then(|h| h.into_string().ok())
            && !host.is_empty()
        {
            tags.insert("host".to_string(), host);
        }

        Ok(tags)
    }
}
