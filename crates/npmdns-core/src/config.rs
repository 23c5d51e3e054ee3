//! Configuration types for npmdns
//!
//! The configuration is built once at startup (the daemon reads it from the
//! environment) and handed by value to the components that need it. Nothing
//! in here is mutated afterwards.

use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

/// Default public IP service
pub const DEFAULT_IP_SERVICE_URL: &str = "https://api.ipify.org?format=json";

/// Default Cloudflare API base URL
pub const DEFAULT_CLOUDFLARE_API_URL: &str = "https://api.cloudflare.com/client/v4";

/// Main npmdns configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NpmdnsConfig {
    /// Nginx Proxy Manager connection
    pub npm: NpmConfig,

    /// Root domain → DNS credentials, in configuration order
    pub zones: Vec<ZoneConfig>,

    /// Where state artifacts live
    #[serde(default)]
    pub state: StateConfig,

    /// Polling and backoff policy
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Fields sent on record create/update
    #[serde(default)]
    pub records: RecordSettings,

    /// Reconciler behaviour
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Public IP service URL (must answer `{"ip": "..."}`)
    #[serde(default = "default_ip_service_url")]
    pub ip_service_url: String,

    /// Cloudflare API base URL
    #[serde(default = "default_cloudflare_api_url")]
    pub cloudflare_api_url: String,
}

impl NpmdnsConfig {
    /// Create a configuration with defaults for everything but the
    /// connection details
    pub fn new(npm: NpmConfig, zones: Vec<ZoneConfig>) -> Self {
        Self {
            npm,
            zones,
            state: StateConfig::default(),
            schedule: ScheduleConfig::default(),
            records: RecordSettings::default(),
            reconcile: ReconcileConfig::default(),
            ip_service_url: default_ip_service_url(),
            cloudflare_api_url: default_cloudflare_api_url(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.npm.validate()?;

        if self.zones.is_empty() {
            return Err(crate::Error::config("No DNS zones configured"));
        }

        let mut seen = HashSet::new();
        for zone in &self.zones {
            zone.validate()?;
            if !seen.insert(zone.normalized_domain()) {
                return Err(crate::Error::config(format!(
                    "Root domain configured twice: {}",
                    zone.domain
                )));
            }
        }

        validate_url("ip_service_url", &self.ip_service_url)?;
        validate_url("cloudflare_api_url", &self.cloudflare_api_url)?;
        self.schedule.validate()?;
        self.records.validate()?;

        Ok(())
    }
}

/// Nginx Proxy Manager connection settings
#[derive(Clone, Deserialize)]
pub struct NpmConfig {
    /// Base URL, e.g. `http://npm:81`
    pub url: String,
    /// Login identity (usually an e-mail address)
    pub user: String,
    /// Login secret
    pub password: String,
}

impl std::fmt::Debug for NpmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NpmConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl NpmConfig {
    /// Validate the NPM settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_url("npm.url", &self.url)?;
        if self.user.is_empty() {
            return Err(crate::Error::config("NPM user cannot be empty"));
        }
        if self.password.is_empty() {
            return Err(crate::Error::config("NPM password cannot be empty"));
        }
        Ok(())
    }
}

/// Credentials for one root domain
///
/// Every hostname under `domain` is written through this zone.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ZoneConfig {
    /// Root domain, e.g. `example.com`
    pub domain: String,
    /// API token with DNS edit permission on the zone
    pub api_token: String,
    /// Provider zone identifier
    pub zone_id: String,
}

impl std::fmt::Debug for ZoneConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneConfig")
            .field("domain", &self.domain)
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .finish()
    }
}

impl ZoneConfig {
    /// Create a zone entry
    pub fn new(
        domain: impl Into<String>,
        api_token: impl Into<String>,
        zone_id: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            api_token: api_token.into(),
            zone_id: zone_id.into(),
        }
    }

    /// Root domain in the form used for matching
    pub fn normalized_domain(&self) -> String {
        crate::resolver::normalize_hostname(&self.domain)
    }

    /// Validate the zone entry
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.normalized_domain().is_empty() {
            return Err(crate::Error::config("Zone root domain cannot be empty"));
        }
        if self.api_token.is_empty() {
            return Err(crate::Error::config(format!(
                "API token for {} cannot be empty",
                self.domain
            )));
        }
        if self.zone_id.is_empty() {
            return Err(crate::Error::config(format!(
                "Zone ID for {} cannot be empty",
                self.domain
            )));
        }
        Ok(())
    }
}

/// How hostnames are matched against root domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuffixMatch {
    /// Hostname equals the root or ends with `.` + root
    #[default]
    Label,
    /// Plain string suffix; `notexample.com` matches `example.com`
    Raw,
}

/// State store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    /// Directory holding the persisted artifacts
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Polling and backoff policy
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Delay between cycles (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// How often every domain is rewritten regardless of change (in seconds)
    #[serde(default = "default_force_interval_secs")]
    pub force_interval_secs: u64,

    /// Failed cycles in a row before the interval is doubled once
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            force_interval_secs: default_force_interval_secs(),
            max_consecutive_errors: default_max_consecutive_errors(),
        }
    }
}

impl ScheduleConfig {
    /// Delay between cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Number of cycles between forced refreshes (at least 1)
    pub fn force_every(&self) -> u64 {
        if self.interval_secs == 0 {
            return 1;
        }
        self.force_interval_secs.div_ceil(self.interval_secs).max(1)
    }

    /// Validate the schedule
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(10..=86_400).contains(&self.interval_secs) {
            return Err(crate::Error::config(format!(
                "Polling interval must be between 10 and 86400 seconds, got {}",
                self.interval_secs
            )));
        }
        if self.force_interval_secs < self.interval_secs {
            return Err(crate::Error::config(
                "Forced refresh interval cannot be shorter than the polling interval",
            ));
        }
        if self.max_consecutive_errors == 0 {
            return Err(crate::Error::config("max_consecutive_errors must be > 0"));
        }
        Ok(())
    }
}

/// Record fields written on create and update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RecordSettings {
    /// TTL in seconds (1 means "automatic" on Cloudflare)
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Whether the record is proxied through the provider's edge
    #[serde(default = "default_proxied")]
    pub proxied: bool,
}

impl Default for RecordSettings {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            proxied: default_proxied(),
        }
    }
}

impl RecordSettings {
    /// Validate the record settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ttl != 1 && !(60..=86_400).contains(&self.ttl) {
            return Err(crate::Error::config(format!(
                "Record TTL must be 1 (auto) or between 60 and 86400, got {}",
                self.ttl
            )));
        }
        Ok(())
    }
}

/// Reconciler behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReconcileConfig {
    /// Hostname to root domain matching
    #[serde(default)]
    pub suffix_match: SuffixMatch,

    /// Treat ledger entries with no current domain as pending deletions
    #[serde(default = "default_reconcile_orphans")]
    pub reconcile_orphans: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            suffix_match: SuffixMatch::default(),
            reconcile_orphans: default_reconcile_orphans(),
        }
    }
}

fn validate_url(field: &str, url: &str) -> Result<(), crate::Error> {
    if url.is_empty() {
        return Err(crate::Error::config(format!("{} cannot be empty", field)));
    }
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(crate::Error::config(format!(
            "{} must use http or https, got: {}",
            field, url
        )));
    }
    Ok(())
}

fn default_ip_service_url() -> String {
    DEFAULT_IP_SERVICE_URL.to_string()
}

fn default_cloudflare_api_url() -> String {
    DEFAULT_CLOUDFLARE_API_URL.to_string()
}

fn default_data_dir() -> String {
    "/data".to_string()
}

fn default_interval_secs() -> u64 {
    300
}

fn default_force_interval_secs() -> u64 {
    86_400
}

fn default_max_consecutive_errors() -> u32 {
    5
}

fn default_ttl() -> u32 {
    3600
}

fn default_proxied() -> bool {
    true
}

fn default_reconcile_orphans() -> bool {
    true
}
