pub mod client;

pub use client::{ClientConfig, ClientError, ConnectionStats, HttpSink};

use std::future::Future;
use std::sync::Arc;

/// Connection parameters of the target database. Immutable once a publisher
/// has been built around them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Host name or base URL (`influxdb`, `http://10.0.0.5`, `https://db.lab`).
    pub host: String,
    pub port: u16,
    pub org: String,
    pub token: String,
    pub bucket: String,
}

impl ServerInfo {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        org: impl Into<String>,
        token: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            org: org.into(),
            token: token.into(),
            bucket: bucket.into(),
        }
    }
}

/// Raw reply of the database to one write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkResponse {
    pub status: u16,
    pub body: String,
}

impl SinkResponse {
    /// The write endpoint acknowledges with a 2xx status and an empty body;
    /// anything else carries an error description.
    pub fn is_ack(&self) -> bool {
        (200..300).contains(&self.status) && self.body.trim().is_empty()
    }
}

/// Destination for encoded line-protocol bodies.
pub trait LineProtocolSink: Send + Sync {
    fn post(
        &self,
        server: &ServerInfo,
        body: &str,
    ) -> impl Future<Output = Result<SinkResponse, ClientError>> + Send;
}

impl<T: LineProtocolSink> LineProtocolSink for Arc<T> {
    fn post(
        &self,
        server: &ServerInfo,
        body: &str,
    ) -> impl Future<Output = Result<SinkResponse, ClientError>> + Send {
        (**self).post(server, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_requires_success_and_empty_body() {
        let ack = SinkResponse {
            status: 204,
            body: String::new(),
        };
        assert!(ack.is_ack());

        let whitespace = SinkResponse {
            status: 204,
            body: "\n".to_string(),
        };
        assert!(whitespace.is_ack());

        let error_body = SinkResponse {
            status: 200,
            body: r#"{"code":"invalid"}"#.to_string(),
        };
        assert!(!error_body.is_ack());

        let error_status = SinkResponse {
            status: 503,
            body: String::new(),
        };
        assert!(!error_status.is_ack());
    }
}
