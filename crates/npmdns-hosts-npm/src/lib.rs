// # Nginx Proxy Manager Host Source
//
// This crate lists the hostnames served by an Nginx Proxy Manager (NPM)
// instance.
//
// ## API Reference
//
// ```http
// POST /api/tokens
// {"identity": "admin@example.com", "secret": "..."}
// → {"token": "...", "expires": "..."}
//
// GET /api/nginx/proxy-hosts
// Authorization: Bearer <token>
// → [{"id": 1, "domain_names": ["a.example.com", "b.example.com"], ...}, ...]
// ```
//
// ## Security Requirements
//
// - The password and the session token NEVER appear in logs or Debug output
//
// A fresh token is requested every cycle; nothing is cached.

use async_trait::async_trait;
use npmdns_core::config::NpmConfig;
use npmdns_core::resolver::normalize_hostname;
use npmdns_core::traits::{DomainSet, HostSource};
use npmdns_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default HTTP timeout for NPM requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct TokenRequest<'a> {
    identity: &'a str,
    secret: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ProxyHost {
    #[serde(default)]
    domain_names: Vec<String>,
}

/// Host source backed by the NPM REST API
pub struct NpmHostSource {
    /// Base URL without trailing slash
    base_url: String,

    user: String,

    /// ⚠️ NEVER log this value
    password: String,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for NpmHostSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NpmHostSource")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl NpmHostSource {
    /// Create a new NPM host source
    ///
    /// # Parameters
    ///
    /// - `base_url`: NPM admin URL, e.g. `http://npm:81`
    /// - `user`: login identity
    /// - `password`: login secret
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            password: password.into(),
            client,
        })
    }

    /// Create a host source from configuration
    pub fn from_config(config: &NpmConfig) -> Result<Self> {
        Self::new(&config.url, &config.user, &config.password)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Flatten proxy hosts into a normalized domain set
fn collect_domains(hosts: Vec<ProxyHost>) -> DomainSet {
    hosts
        .into_iter()
        .flat_map(|host| host.domain_names)
        .map(|name| normalize_hostname(&name))
        .filter(|name| !name.is_empty())
        .collect()
}

#[async_trait]
impl HostSource for NpmHostSource {
    async fn authenticate(&self) -> Result<String> {
        let response = self
            .client
            .post(self.url("/api/tokens"))
            .json(&TokenRequest {
                identity: &self.user,
                secret: &self.password,
            })
            .send()
            .await
            .map_err(|e| Error::auth(format!("NPM login request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::auth(format!(
                "NPM rejected login for {}: {}",
                self.user, status
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Failed to parse NPM token response: {}", e)))?;

        if body.token.is_empty() {
            return Err(Error::auth("NPM returned an empty token"));
        }

        tracing::debug!("Obtained NPM token for {}", self.user);
        Ok(body.token)
    }

    async fn list_domains(&self, token: &str) -> Result<DomainSet> {
        let response = self
            .client
            .get(self.url("/api/nginx/proxy-hosts"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::host_source(format!("Proxy host request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::host_source(format!(
                "Proxy host listing failed: {} - {}",
                status, error_text
            )));
        }

        let hosts: Vec<ProxyHost> = response
            .json()
            .await
            .map_err(|e| Error::host_source(format!("Failed to parse proxy hosts: {}", e)))?;

        let host_count = hosts.len();
        let domains = collect_domains(hosts);
        tracing::debug!(
            "NPM reported {} proxy host(s) with {} domain(s)",
            host_count,
            domains.len()
        );
        Ok(domains)
    }

    fn source_name(&self) -> &'static str {
        "nginx-proxy-manager"
    }
}
