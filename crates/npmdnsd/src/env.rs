// # Environment configuration
//
// Every setting comes from an `NPMDNS_*` environment variable. Parsing goes
// through a lookup function so it can be exercised without touching the
// process environment.

use anyhow::{Context, Result};
use npmdns_core::config::{
    NpmConfig, NpmdnsConfig, ReconcileConfig, RecordSettings, ScheduleConfig, StateConfig,
    SuffixMatch, ZoneConfig,
};
use std::str::FromStr;
use tracing::Level;

/// How DNS writes are carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Writes go to the provider and state is persisted
    Live,
    /// Writes are only logged and state is kept in memory
    DryRun,
}

/// Daemon configuration: the core configuration plus process-level switches
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub core: NpmdnsConfig,
    /// Run a single cycle and exit with its status
    pub run_once: bool,
    /// Force the first (or only) cycle
    pub force_update: bool,
    pub mode: Mode,
    pub log_level: Level,
}

impl DaemonConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`
    ///
    /// Unset and empty variables fall back to their defaults; required
    /// variables produce an error naming the variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).with_context(|| format!("{} is required. Set it via: export {}=...", key, key))
        };

        let npm = NpmConfig {
            url: require("NPMDNS_NPM_URL")?,
            user: require("NPMDNS_NPM_USER")?,
            password: require("NPMDNS_NPM_PASSWORD")?,
        };

        let zones: Vec<ZoneConfig> = serde_json::from_str(&require("NPMDNS_ZONES")?).context(
            "NPMDNS_ZONES must be a JSON array of {\"domain\", \"api_token\", \"zone_id\"} objects",
        )?;

        let schedule_defaults = ScheduleConfig::default();
        let schedule = ScheduleConfig {
            interval_secs: parse_or(&get, "NPMDNS_INTERVAL_SECS", schedule_defaults.interval_secs)?,
            force_interval_secs: parse_or(
                &get,
                "NPMDNS_FORCE_INTERVAL_SECS",
                schedule_defaults.force_interval_secs,
            )?,
            max_consecutive_errors: parse_or(
                &get,
                "NPMDNS_MAX_CONSECUTIVE_ERRORS",
                schedule_defaults.max_consecutive_errors,
            )?,
        };

        let record_defaults = RecordSettings::default();
        let records = RecordSettings {
            ttl: parse_or(&get, "NPMDNS_RECORD_TTL", record_defaults.ttl)?,
            proxied: flag_or(&get, "NPMDNS_RECORD_PROXIED", record_defaults.proxied)?,
        };

        let reconcile_defaults = ReconcileConfig::default();
        let reconcile = ReconcileConfig {
            suffix_match: match get("NPMDNS_SUFFIX_MATCH") {
                None => reconcile_defaults.suffix_match,
                Some(value) => parse_suffix_match(&value)?,
            },
            reconcile_orphans: flag_or(
                &get,
                "NPMDNS_RECONCILE_ORPHANS",
                reconcile_defaults.reconcile_orphans,
            )?,
        };

        let mut core = NpmdnsConfig::new(npm, zones);
        core.schedule = schedule;
        core.records = records;
        core.reconcile = reconcile;
        if let Some(data_dir) = get("NPMDNS_DATA_DIR") {
            core.state = StateConfig { data_dir };
        }
        if let Some(url) = get("NPMDNS_IP_SERVICE_URL") {
            core.ip_service_url = url;
        }
        if let Some(url) = get("NPMDNS_CLOUDFLARE_API_URL") {
            core.cloudflare_api_url = url;
        }

        let mode = match get("NPMDNS_MODE").map(|m| m.to_lowercase()).as_deref() {
            None | Some("live") => Mode::Live,
            Some("dry-run") | Some("dryrun") => Mode::DryRun,
            Some(other) => anyhow::bail!(
                "NPMDNS_MODE '{}' is not valid. Valid modes: live, dry-run",
                other
            ),
        };

        let log_level = match get("NPMDNS_LOG_LEVEL") {
            None => Level::INFO,
            Some(level) => parse_log_level(&level)?,
        };

        Ok(Self {
            core,
            run_once: flag_or(&get, "NPMDNS_RUN_ONCE", false)?,
            force_update: flag_or(&get, "NPMDNS_FORCE_UPDATE", false)?,
            mode,
            log_level,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.core.validate()?;

        // Plain HTTP is fine for an NPM instance on the local network, not
        // for anything carrying the Cloudflare token
        if self.core.cloudflare_api_url.starts_with("http://") {
            tracing::warn!(
                "NPMDNS_CLOUDFLARE_API_URL uses HTTP (not HTTPS); API tokens are sent in clear text"
            );
        }

        Ok(())
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode == Mode::DryRun
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
    }
}

fn flag_or<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => parse_flag(&raw).with_context(|| {
            format!(
                "{} has an invalid value '{}'. Use true/false, 1/0 or yes/no",
                key, raw
            )
        }),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_suffix_match(raw: &str) -> Result<SuffixMatch> {
    match raw.trim().to_lowercase().as_str() {
        "label" => Ok(SuffixMatch::Label),
        "raw" => Ok(SuffixMatch::Raw),
        _ => anyhow::bail!(
            "NPMDNS_SUFFIX_MATCH '{}' is not valid. Valid values: label, raw",
            raw
        ),
    }
}

fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "NPMDNS_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            raw
        ),
    }
}
