use super::{LineProtocolSink, ServerInfo, SinkResponse};
use flate2::{Compression, write::GzEncoder};
use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use url::Url;

const WRITE_PATH: &str = "/api/v2/write";
const HEALTH_PATH: &str = "/health";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Request timeout: {0}")]
    RequestTimeout(String),
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },
    #[error("Compression failed: {0}")]
    Compression(#[from] std::io::Error),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub user_agent: String,
    pub enable_compression: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            connection_timeout: Duration::from_secs(2),
            user_agent: format!("ue-metrics-influx/{}", env!("CARGO_PKG_VERSION")),
            enable_compression: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time: Duration,
}

#[derive(Debug, Default)]
struct ClientStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_response_time: AtomicU64,
}

impl ClientStats {
    fn record_request(&self, success: bool, response_time: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time
            .fetch_add(response_time.as_millis() as u64, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> ConnectionStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_response_time = self.total_response_time.load(Ordering::Relaxed);

        let average_response_time = if total_requests > 0 {
            Duration::from_millis(total_response_time / total_requests)
        } else {
            Duration::ZERO
        };

        ConnectionStats {
            total_requests,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            average_response_time,
        }
    }
}

/// Line-protocol sink speaking the InfluxDB v2 HTTP write API.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    config: ClientConfig,
    stats: Arc<ClientStats>,
}

impl HttpSink {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ClientError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config,
            stats: Arc::new(ClientStats::default()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// `scheme://host:port` of the database; a bare host defaults to plain HTTP.
    pub fn base_url(server: &ServerInfo) -> Result<Url, ClientError> {
        let raw = if server.host.contains("://") {
            server.host.clone()
        } else {
            format!("http://{}", server.host)
        };

        let mut url = Url::parse(&raw).map_err(|e| {
            ClientError::InvalidConfiguration(format!("Invalid database URL '{raw}': {e}"))
        })?;
        url.set_port(Some(server.port)).map_err(|()| {
            ClientError::InvalidConfiguration(format!("Database URL '{raw}' cannot carry a port"))
        })?;
        url.set_query(None);
        Ok(url)
    }

    pub fn write_url(server: &ServerInfo) -> Result<Url, ClientError> {
        let mut url = Self::base_url(server)?;
        url.set_path(WRITE_PATH);
        url.query_pairs_mut()
            .append_pair("org", &server.org)
            .append_pair("bucket", &server.bucket)
            .append_pair("precision", "ns");
        Ok(url)
    }

    pub async fn health_check(&self, server: &ServerInfo) -> Result<(), ClientError> {
        let mut url = Self::base_url(server)?;
        url.set_path(HEALTH_PATH);

        // Not recorded in the write stats.
        let response = self.client.get(url).send().await.map_err(classify)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClientError::HttpError {
                status: response.status().as_u16(),
                message: format!("Health check failed: {}", response.status()),
            })
        }
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        self.stats.snapshot()
    }

    fn prepare_payload(&self, body: &str) -> Result<Vec<u8>, ClientError> {
        if !self.config.enable_compression {
            return Ok(body.as_bytes().to_vec());
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(body.as_bytes())?;
        Ok(encoder.finish()?)
    }
}

impl LineProtocolSink for HttpSink {
    async fn post(&self, server: &ServerInfo, body: &str) -> Result<SinkResponse, ClientError> {
        let url = Self::write_url(server)?;
        let payload = self.prepare_payload(body)?;
        let bytes_sent = payload.len();

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(payload);
        if self.config.enable_compression {
            request = request.header(CONTENT_ENCODING, "gzip");
        }
        if !server.token.is_empty() {
            request = request.header(AUTHORIZATION, format!("Token {}", server.token));
        }

        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.stats.record_request(false, start.elapsed());
                return Err(classify(e));
            }
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                self.stats.record_request(false, start.elapsed());
                return Err(classify(e));
            }
        };
        let latency = start.elapsed();

        let response = SinkResponse { status, body: text };
        self.stats.record_request(response.is_ack(), latency);

        debug!(
            "Write to {} returned HTTP {} ({} bytes sent) in {:?}",
            server.host, status, bytes_sent, latency
        );
        Ok(response)
    }
}

fn classify(error: reqwest::Error) -> ClientError {
    if error.is_timeout() {
        ClientError::RequestTimeout(error.to_string())
    } else {
        ClientError::NetworkError(error)
    }
}
