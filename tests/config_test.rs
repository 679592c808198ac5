use serial_test::serial;
use std::env;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use ue_metrics_influx::TimestampPolicy;
use ue_metrics_influx::app::{Config, ConfigError, LogLevel};

fn clean_all_env_vars() {
    let env_vars = [
        "INFLUXDB_URL",
        "INFLUXDB_PORT",
        "INFLUXDB_ORG",
        "INFLUXDB_TOKEN",
        "INFLUXDB_BUCKET",
        "MEASUREMENT",
        "TAGS",
        "UE_DATA_IDENTIFIER",
        "TIMESTAMP_POLICY",
        "SIGNIFICANT_DIGITS",
        "PERIOD_USEC",
        "REQUEST_TIMEOUT_SECS",
        "ENABLE_COMPRESSION",
        "LOG_LEVEL",
        "INPUT",
        "CONFIG_FILE",
    ];

    unsafe {
        for var in &env_vars {
            env::remove_var(var);
        }
    }
}

#[test]
#[serial]
fn test_config_from_args() {
    clean_all_env_vars();

    let config = Config::from_args([
        "ue-metrics-influx",
        "--influxdb-url",
        "http://influxdb",
        "--influxdb-port",
        "9999",
        "--influxdb-token",
        "secret",
        "--tag",
        "testbed=lab",
        "--tag",
        "host=ue-1",
        "--timestamp-policy",
        "wall-clock",
        "--significant-digits",
        "6",
        "--period-usec",
        "500000",
        "--request-timeout-secs",
        "3",
        "--enable-compression",
        "--log-level",
        "debug",
    ])
    .unwrap();

    assert_eq!(config.influxdb_url, "http://influxdb");
    assert_eq!(config.influxdb_port, 9999);
    assert_eq!(config.influxdb_token, "secret");
    assert_eq!(config.timestamp_policy, TimestampPolicy::WallClock);
    assert_eq!(config.significant_digits, 6);
    assert_eq!(config.period_usec, 500_000);
    assert_eq!(config.request_timeout, Duration::from_secs(3));
    assert!(config.enable_compression);
    assert_eq!(config.log_level, LogLevel::Debug);

    let tags = config.parsed_tags().unwrap();
    assert_eq!(tags.get("testbed").map(String::as_str), Some("lab"));
    assert_eq!(tags.get("host").map(String::as_str), Some("ue-1"));
    assert!(tags.contains_key("ue_data_identifier"));

    let server = config.server_info();
    assert_eq!(server.host, "http://influxdb");
    assert_eq!(server.port, 9999);
    assert_eq!(server.bucket, "srsran");
}

#[test]
#[serial]
fn test_defaults() {
    clean_all_env_vars();

    let config = Config::from_args(["ue-metrics-influx"]).unwrap();
    assert_eq!(config.influxdb_url, "http://localhost");
    assert_eq!(config.influxdb_port, 8086);
    assert_eq!(config.influxdb_org, "srs");
    assert_eq!(config.influxdb_bucket, "srsran");
    assert_eq!(config.measurement, "ue_info");
    assert_eq!(config.timestamp_policy, TimestampPolicy::Accumulating);
    assert_eq!(config.significant_digits, 4);
    assert_eq!(config.period_usec, 1_000_000);
    assert!(!config.enable_compression);
    assert_eq!(config.input.as_os_str(), "-");
}

#[test]
#[serial]
fn test_config_from_env() {
    clean_all_env_vars();
    unsafe {
        env::set_var("INFLUXDB_URL", "https://db.lab");
        env::set_var("INFLUXDB_BUCKET", "ue");
        env::set_var("TAGS", "testbed=lab,site=north");
        env::set_var("UE_DATA_IDENTIFIER", "run-42");
        env::set_var("TIMESTAMP_POLICY", "wall-clock");
        env::set_var("LOG_LEVEL", "warn");
    }

    let config = Config::from_args(["ue-metrics-influx"]).unwrap();
    clean_all_env_vars();

    assert_eq!(config.influxdb_url, "https://db.lab");
    assert_eq!(config.influxdb_bucket, "ue");
    assert_eq!(config.timestamp_policy, TimestampPolicy::WallClock);
    assert_eq!(config.log_level, LogLevel::Warn);
    assert_eq!(config.ue_data_identifier.as_deref(), Some("run-42"));

    let tags = config.parsed_tags().unwrap();
    assert_eq!(tags.get("site").map(String::as_str), Some("north"));
    assert_eq!(
        tags.get("ue_data_identifier").map(String::as_str),
        Some("run-42")
    );
}

#[test]
#[serial]
fn test_identifier_is_stable_once_generated() {
    clean_all_env_vars();

    let config = Config::from_args(["ue-metrics-influx"]).unwrap();
    let identifier = config.ue_data_identifier.clone().unwrap();
    assert!(uuid_like(&identifier), "not a uuid: {identifier}");

    let first = config.parsed_tags().unwrap();
    let second = config.parsed_tags().unwrap();
    assert_eq!(first.get("ue_data_identifier"), Some(&identifier));
    assert_eq!(first, second);
}

fn uuid_like(value: &str) -> bool {
    value.len() == 36 && value.chars().filter(|c| *c == '-').count() == 4
}

#[test]
#[serial]
fn test_config_file_replaces_cli_values() {
    clean_all_env_vars();

    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
influxdb_url = "http://metrics-db"
influxdb_port = 8087
influxdb_org = "lab"
influxdb_bucket = "ue_metrics"
tags = ["testbed=lab"]
timestamp_policy = "wall-clock"
period_usec = 250000
log_level = "trace"
"#
    )
    .unwrap();

    let path = file.path().to_str().unwrap().to_string();
    let config = Config::load([
        "ue-metrics-influx",
        "--influxdb-port",
        "1234",
        "--config-file",
        path.as_str(),
    ])
    .unwrap();

    assert_eq!(config.influxdb_url, "http://metrics-db");
    assert_eq!(config.influxdb_port, 8087);
    assert_eq!(config.influxdb_org, "lab");
    assert_eq!(config.influxdb_bucket, "ue_metrics");
    assert_eq!(config.timestamp_policy, TimestampPolicy::WallClock);
    assert_eq!(config.period_usec, 250_000);
    assert_eq!(config.log_level, LogLevel::Trace);
    // Unset keys keep their defaults.
    assert_eq!(config.measurement, "ue_info");
    assert_eq!(config.request_timeout, Duration::from_secs(5));
}

#[test]
fn test_invalid_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "influxdb_port = \"not a number\"").unwrap();
    assert!(matches!(
        Config::from_file(file.path()),
        Err(ConfigError::ParseError(_))
    ));

    assert!(matches!(
        Config::from_file("/nonexistent/ue-metrics.toml"),
        Err(ConfigError::FileError(_))
    ));
}

#[test]
fn test_invalid_values_rejected() {
    for content in [
        "period_usec = 0",
        "influxdb_bucket = \"\"",
        "measurement = \"\"",
        "significant_digits = 0",
        "request_timeout_secs = 0",
        "tags = [\"no-equals-sign\"]",
    ] {
        assert!(
            matches!(
                Config::from_toml(content),
                Err(ConfigError::InvalidConfig(_))
            ),
            "accepted: {content}"
        );
    }

    assert!(matches!(
        Config::from_toml("influxdb_url = \"http://\""),
        Err(ConfigError::InvalidUrl(_))
    ));
}
