// # HTTP IP Source
//
// This crate provides the public IPv4 lookup for npmdns.
//
// ## Architecture
//
// One GET against a JSON service (ipify by default) per call:
//
// ```http
// GET https://api.ipify.org?format=json
//
// {"ip": "203.0.113.7"}
// ```
//
// No caching, no polling and no retries: the cycle driver calls `current()`
// once per cycle and decides what a failure means.

use async_trait::async_trait;
use npmdns_core::config::DEFAULT_IP_SERVICE_URL;
use npmdns_core::traits::IpSource;
use npmdns_core::{Error, Result};
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default HTTP timeout for the lookup (10 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

/// HTTP-based public IP source
#[derive(Debug)]
pub struct HttpIpSource {
    /// URL to fetch the IP from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source
    ///
    /// # Parameters
    ///
    /// - `url`: JSON service answering `{"ip": "..."}`
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create with a custom request timeout
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Create a source using ipify
    pub fn ipify() -> Result<Self> {
        Self::new(DEFAULT_IP_SERVICE_URL)
    }

    /// URL the source queries
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Parse the service's answer into an IPv4 address
fn parse_ip(raw: &str) -> Result<Ipv4Addr> {
    let raw = raw.trim();
    raw.parse::<Ipv4Addr>()
        .map_err(|_| Error::ip_source(format!("Invalid IPv4 address: {:?}", raw)))
}

#[async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::ip_source(format!("Request to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_source(format!(
                "HTTP error from {}: {}",
                self.url,
                response.status()
            )));
        }

        let body: IpResponse = response
            .json()
            .await
            .map_err(|e| Error::ip_source(format!("Failed to parse response: {}", e)))?;

        let ip = parse_ip(&body.ip)?;
        tracing::debug!("Public IP from {}: {}", self.url, ip);
        Ok(ip)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[test]
    fn test_parse_ip() {
        assert_eq!(parse_ip(" 203.0.113.7\n").unwrap(), Ipv4Addr::new(203, 0, 113, 7));
        assert!(matches!(parse_ip("2001:db8::1"), Err(Error::IpSource(_))));
        assert!(parse_ip("").is_err());
    }

    #[test]
    fn test_ipify_default() {
        let source = HttpIpSource::ipify().unwrap();
        assert_eq!(source.url(), "https://api.ipify.org?format=json");
        assert_eq!(source.source_name(), "http");
    }

    #[tokio::test]
    async fn test_current_reads_json() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ip":"198.51.100.23"}"#)
            .create_async()
            .await;

        let source = HttpIpSource::new(server.url()).unwrap();
        let ip = source.current().await.unwrap();

        mock.assert_async().await;
        assert_eq!(ip, Ipv4Addr::new(198, 51, 100, 23));
    }

    #[tokio::test]
    async fn test_http_error_is_ip_source_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(503)
            .create_async()
            .await;

        let source = HttpIpSource::new(server.url()).unwrap();
        let err = source.current().await.unwrap_err();
        assert!(matches!(err, Error::IpSource(_)));
        assert!(err.is_fatal_for_cycle());
    }

    #[tokio::test]
    async fn test_malformed_body_is_ip_source_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body("203.0.113.7")
            .create_async()
            .await;

        let source = HttpIpSource::new(server.url()).unwrap();
        assert!(matches!(source.current().await, Err(Error::IpSource(_))));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_ip_source_error() {
        // Bind an ephemeral port, then release it so nothing is listening
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let url = format!("http://{}/", addr);
        let source = HttpIpSource::with_timeout(url, Duration::from_secs(2)).unwrap();
        assert!(matches!(source.current().await, Err(Error::IpSource(_))));
    }
}
