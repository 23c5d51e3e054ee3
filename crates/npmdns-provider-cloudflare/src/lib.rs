// # Cloudflare DNS Provider
//
// This crate provides the Cloudflare implementation of `DnsProvider` for
// npmdns. One provider instance is bound to one zone and its API token.
//
// ## Behaviour
//
// - ✅ One HTTP request per trait call
// - ✅ Full error propagation (the reconciler isolates failures per domain)
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Specific error handling for HTTP status codes (401/403, 404, 409, 429, 5xx)
// - ✅ `{success, errors, result}` envelope decoded; `success: false` is an error
// - ✅ Dry-run mode: GETs are performed, writes are only logged
// - ❌ NO retry logic (a failed domain is retried on the next cycle)
// - ❌ NO caching (every lookup goes to the API)
// - ❌ NO background tasks
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Provider construction fails if the token or zone ID is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=A&name=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use npmdns_core::config::{DEFAULT_CLOUDFLARE_API_URL, RecordSettings, ZoneConfig};
use npmdns_core::traits::{DnsProvider, DnsProviderFactory, DnsRecord};
use npmdns_core::{Error, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "cloudflare";

/// Record ID reported for records that were only pretended to be created
pub const DRY_RUN_RECORD_ID: &str = "dry-run";

/// Cloudflare response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

/// DNS record as returned by the API
#[derive(Debug, Deserialize)]
struct CfRecord {
    id: String,
    name: String,
    #[serde(rename = "type", default)]
    record_type: String,
    content: String,
    ttl: Option<u32>,
    proxied: Option<bool>,
}

impl From<CfRecord> for DnsRecord {
    fn from(record: CfRecord) -> Self {
        DnsRecord {
            id: record.id,
            name: record.name,
            content: record.content,
            ttl: record.ttl,
            proxied: record.proxied,
        }
    }
}

/// Body of create and update calls
#[derive(Debug, Serialize)]
struct RecordPayload<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    name: &'a str,
    content: String,
    ttl: u32,
    proxied: bool,
}

/// Cloudflare DNS provider
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. Whether a write is needed, and what happens
/// when it fails, is decided by the reconciler.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (record lookup)
/// - Log the intended POST / PUT / DELETE
/// - **NOT** actually modify DNS records
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone the provider is bound to
    zone_id: String,

    /// API base URL without trailing slash
    base_url: String,

    /// TTL and proxied flag sent on writes
    settings: RecordSettings,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("base_url", &self.base_url)
            .field("settings", &self.settings)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `zone_id`: Zone the records live in
    /// - `base_url`: API base URL (`https://api.cloudflare.com/client/v4`)
    /// - `settings`: TTL and proxied flag for created/updated records
    /// - `dry_run`: If true, perform GET requests but skip writes
    pub fn new(
        api_token: impl Into<String>,
        zone_id: impl Into<String>,
        base_url: impl Into<String>,
        settings: RecordSettings,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let zone_id = zone_id.into();
        if zone_id.is_empty() {
            return Err(Error::config("Cloudflare zone ID cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            zone_id,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            settings,
            client,
            dry_run,
        })
    }

    /// Zone the provider writes into
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    /// Whether writes are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, self.zone_id)
    }

    fn record_url(&self, record_id: &str) -> String {
        format!("{}/{}", self.records_url(), record_id)
    }

    fn payload<'a>(&self, name: &'a str, ip: Ipv4Addr) -> RecordPayload<'a> {
        RecordPayload {
            record_type: "A",
            name,
            content: ip.to_string(),
            ttl: self.settings.ttl,
            proxied: self.settings.proxied,
        }
    }

    fn dry_run_record(&self, id: &str, name: &str, ip: Ipv4Addr) -> DnsRecord {
        DnsRecord {
            id: id.to_string(),
            name: name.to_string(),
            content: ip.to_string(),
            ttl: Some(self.settings.ttl),
            proxied: Some(self.settings.proxied),
        }
    }

    /// Send a request and decode the envelope
    ///
    /// `context` names the operation in error messages. Returns the
    /// envelope's `result`, which may be absent.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<Option<T>> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, context, &error_text));
        }

        let envelope: Envelope<T> = response.json().await.map_err(|e| {
            Error::provider(PROVIDER, format!("Failed to parse {} response: {}", context, e))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER,
                format!("{} rejected: {}", context, describe(&envelope.errors)),
            ));
        }

        Ok(envelope.result)
    }
}

/// Map a non-2xx status to an error
fn status_error(status: StatusCode, context: &str, body: &str) -> Error {
    match status.as_u16() {
        // A bad zone token fails that zone's domains only; Error::Authentication
        // would abort the whole cycle
        401 | 403 => Error::provider(
            PROVIDER,
            format!(
                "Authentication failed: Invalid API token or insufficient permissions. Status: {}",
                status
            ),
        ),
        404 => Error::not_found(format!("{}: {}", context, status)),
        409 => Error::provider(
            PROVIDER,
            format!("Conflict during {}. Status: {} - {}", context, status, body),
        ),
        429 => Error::rate_limited(format!(
            "Rate limit exceeded during {}. Status: {}",
            context, status
        )),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, body),
        ),
        _ => Error::provider(PROVIDER, format!("{} failed: {} - {}", context, status, body)),
    }
}

fn describe(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| format!("[{}] {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// ```http
    /// GET /zones/:zone_id/dns_records?type=A&name=www.example.com
    /// ```
    async fn find_a_records(&self, name: &str) -> Result<Vec<DnsRecord>> {
        tracing::debug!("Looking up A records for {} in zone {}", name, self.zone_id);

        let request = self
            .client
            .get(self.records_url())
            .query(&[("type", "A"), ("name", name)]);
        let records: Vec<CfRecord> = self
            .send(request, "record lookup")
            .await?
            .unwrap_or_default();

        Ok(records
            .into_iter()
            .filter(|r| r.record_type.is_empty() || r.record_type == "A")
            .map(DnsRecord::from)
            .collect())
    }

    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// {"type": "A", "name": "...", "content": "1.2.3.4", "ttl": 3600, "proxied": true}
    /// ```
    async fn create_a_record(&self, name: &str, ip: Ipv4Addr) -> Result<DnsRecord> {
        let payload = self.payload(name, ip);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                self.records_url(),
                serde_json::to_string(&payload).unwrap_or_default()
            );
            return Ok(self.dry_run_record(DRY_RUN_RECORD_ID, name, ip));
        }

        let request = self.client.post(self.records_url()).json(&payload);
        let record: CfRecord = self
            .send(request, "record creation")
            .await?
            .ok_or_else(|| Error::provider(PROVIDER, "Record creation returned no result"))?;

        tracing::debug!("Created record {} for {}", record.id, name);
        Ok(record.into())
    }

    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// {"type": "A", "name": "...", "content": "1.2.3.4", "ttl": 3600, "proxied": true}
    /// ```
    async fn update_a_record(&self, record_id: &str, name: &str, ip: Ipv4Addr) -> Result<DnsRecord> {
        let payload = self.payload(name, ip);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                self.record_url(record_id),
                serde_json::to_string(&payload).unwrap_or_default()
            );
            return Ok(self.dry_run_record(record_id, name, ip));
        }

        let request = self.client.put(self.record_url(record_id)).json(&payload);
        let record: CfRecord = self
            .send(request, "record update")
            .await?
            .ok_or_else(|| Error::provider(PROVIDER, "Record update returned no result"))?;

        Ok(record.into())
    }

    /// ```http
    /// DELETE /zones/:zone_id/dns_records/:record_id
    /// ```
    async fn delete_record(&self, record_id: &str) -> Result<()> {
        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send DELETE request to {}",
                self.record_url(record_id)
            );
            return Ok(());
        }

        let request = self.client.delete(self.record_url(record_id));
        self.send::<serde_json::Value>(request, "record deletion")
            .await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating one Cloudflare provider per zone
#[derive(Debug, Clone)]
pub struct CloudflareFactory {
    base_url: String,
    dry_run: bool,
}

impl CloudflareFactory {
    /// Create a factory for the given API base URL
    pub fn new(base_url: impl Into<String>, dry_run: bool) -> Self {
        Self {
            base_url: base_url.into(),
            dry_run,
        }
    }
}

impl Default for CloudflareFactory {
    fn default() -> Self {
        Self::new(DEFAULT_CLOUDFLARE_API_URL, false)
    }
}

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, zone: &ZoneConfig, settings: &RecordSettings) -> Result<Box<dyn DnsProvider>> {
        if self.dry_run {
            tracing::warn!(
                "Cloudflare provider for {} running in DRY-RUN mode - no changes will be made",
                zone.domain
            );
        }

        let provider = CloudflareProvider::new(
            zone.api_token.clone(),
            zone.zone_id.clone(),
            self.base_url.clone(),
            *settings,
            self.dry_run,
        )?;
        Ok(Box::new(provider))
    }
}
