// # DNS Provider Trait
//
// Defines the record-level interface for writing A-records into one zone.
//
// ## Implementations
//
// - Cloudflare: `npmdns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use npmdns_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation bound to one zone */;
//
//     let existing = provider.find_a_records("www.example.com").await?;
//     if existing.is_empty() {
//         provider
//             .create_a_record("www.example.com", "203.0.113.7".parse()?)
//             .await?;
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

use crate::config::{RecordSettings, ZoneConfig};

/// A DNS record as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// Provider record ID
    pub id: String,
    /// Fully qualified record name
    pub name: String,
    /// Record content (the address, for A-records)
    pub content: String,
    /// TTL in seconds, if reported
    pub ttl: Option<u32>,
    /// Proxied flag, if the provider has one
    pub proxied: Option<bool>,
}

impl DnsRecord {
    /// Whether the record already points at `ip`
    pub fn points_to(&self, ip: Ipv4Addr) -> bool {
        self.content
            .trim()
            .parse::<Ipv4Addr>()
            .is_ok_and(|current| current == ip)
    }
}

/// Trait for DNS provider implementations
///
/// One instance is bound to one zone and its credentials.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure (the reconciler decides what happens next)
///
/// ## Forbidden Capabilities
/// - ❌ Implement retry logic or backoff (a failed domain is retried on the
///   next cycle because its ledger entry stays stale)
/// - ❌ Access the state store
/// - ❌ Decide whether a write is needed (owned by the reconciler)
/// - ❌ Spawn tasks or threads
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List the A-records named `name`
    ///
    /// An empty list means no record exists; it is not an error.
    async fn find_a_records(&self, name: &str) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Create an A-record `name → ip`
    async fn create_a_record(&self, name: &str, ip: Ipv4Addr) -> Result<DnsRecord, crate::Error>;

    /// Overwrite record `record_id` with `name → ip`
    ///
    /// The full field set (type, name, content, TTL, proxied) is sent.
    async fn update_a_record(
        &self,
        record_id: &str,
        name: &str,
        ip: Ipv4Addr,
    ) -> Result<DnsRecord, crate::Error>;

    /// Delete record `record_id`
    async fn delete_record(&self, record_id: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing one provider per configured zone
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider bound to `zone`
    ///
    /// # Parameters
    ///
    /// - `zone`: root domain and credentials
    /// - `settings`: TTL and proxied flag for written records
    fn create(
        &self,
        zone: &ZoneConfig,
        settings: &RecordSettings,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
