// # npmdnsd - NPM → DNS sync daemon
//
// The npmdnsd daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from environment variables (and `.env`)
// 2. Initializing logging and the runtime
// 3. Wiring the NPM host source, IP source, Cloudflare factory and state
//    store into a `CycleDriver`
// 4. Running one cycle, or cycles until SIGTERM/SIGINT
//
// All reconciliation logic lives in npmdns-core.
//
// ## Configuration
//
// ### Required
// - `NPMDNS_NPM_URL`, `NPMDNS_NPM_USER`, `NPMDNS_NPM_PASSWORD`
// - `NPMDNS_ZONES`: JSON array of `{"domain", "api_token", "zone_id"}`
//
// ### Optional
// - `NPMDNS_DATA_DIR` (`/data`), `NPMDNS_INTERVAL_SECS` (300),
//   `NPMDNS_FORCE_INTERVAL_SECS` (86400), `NPMDNS_MAX_CONSECUTIVE_ERRORS` (5)
// - `NPMDNS_IP_SERVICE_URL`, `NPMDNS_CLOUDFLARE_API_URL`
// - `NPMDNS_RECORD_TTL` (3600), `NPMDNS_RECORD_PROXIED` (true)
// - `NPMDNS_SUFFIX_MATCH` (label|raw), `NPMDNS_RECONCILE_ORPHANS` (true)
// - `NPMDNS_RUN_ONCE`, `NPMDNS_FORCE_UPDATE`, `NPMDNS_MODE` (live|dry-run)
// - `NPMDNS_LOG_LEVEL` (info)
//
// ## Example
//
// ```bash
// export NPMDNS_NPM_URL=http://npm:81
// export NPMDNS_NPM_USER=admin@example.com
// export NPMDNS_NPM_PASSWORD=changeme
// export NPMDNS_ZONES='[{"domain":"example.com","api_token":"...","zone_id":"..."}]'
//
// npmdnsd
// ```

mod env;

use anyhow::Result;
use npmdns_core::{
    CycleDriver, CycleReport, FileStateStore, MemoryStateStore, Reconciler, Scheduler, StateStore,
};
use npmdns_hosts_npm::NpmHostSource;
use npmdns_ip_http::HttpIpSource;
use npmdns_provider_cloudflare::CloudflareFactory;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::env::DaemonConfig;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown, or a completed one-shot cycle
/// - 1: Configuration or startup error
/// - 2: One-shot cycle aborted (IP lookup, NPM or state failure)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NpmdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// The single cycle of a one-shot run aborted
    CycleAborted = 2,
}

impl From<NpmdnsExitCode> for ExitCode {
    fn from(code: NpmdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        eprintln!("Failed to load .env file: {}", e);
        return NpmdnsExitCode::ConfigError.into();
    }

    // Load configuration from environment
    let config = match DaemonConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return NpmdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return NpmdnsExitCode::ConfigError.into();
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation error: {:#}", e);
        return NpmdnsExitCode::ConfigError.into();
    }

    info!("Starting npmdnsd daemon");
    info!(
        "Configuration loaded: {} zone(s), mode: {}",
        config.core.zones.len(),
        if config.is_dry_run() { "DRY-RUN" } else { "LIVE" }
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return NpmdnsExitCode::ConfigError.into();
        }
    };

    let code = rt.block_on(async {
        match run_daemon(config).await {
            Ok(code) => code,
            Err(e) => {
                error!("Startup error: {:#}", e);
                NpmdnsExitCode::ConfigError
            }
        }
    });

    code.into()
}

/// Build the collaborators and run
///
/// Errors returned from here are startup errors; cycle failures are turned
/// into exit codes (one-shot) or retried by the scheduler (loop).
async fn run_daemon(config: DaemonConfig) -> Result<NpmdnsExitCode> {
    let driver = build_driver(&config).await?;

    if config.run_once {
        info!("Running a single cycle (forced: {})", config.force_update);
        return Ok(match driver.run_cycle(config.force_update).await {
            Ok(report) => {
                log_report(&report);
                NpmdnsExitCode::CleanShutdown
            }
            Err(e) => {
                error!("Cycle aborted: {}", e);
                NpmdnsExitCode::CycleAborted
            }
        });
    }

    let scheduler = Scheduler::from_config(&config.core.schedule);
    info!(
        "Polling every {}s, forced refresh every {} cycle(s)",
        config.core.schedule.interval_secs,
        config.core.schedule.force_every()
    );

    let shutdown = shutdown_signal().await?;
    driver.run_until(scheduler, shutdown).await;

    info!("Shutting down daemon");
    Ok(NpmdnsExitCode::CleanShutdown)
}

async fn build_driver(config: &DaemonConfig) -> Result<CycleDriver> {
    let core = &config.core;

    let ip_source = HttpIpSource::new(&core.ip_service_url)?;
    let host_source = NpmHostSource::from_config(&core.npm)?;

    let state_store: Box<dyn StateStore> = if config.is_dry_run() {
        warn!("DRY-RUN mode: DNS writes are only logged and state is not persisted");
        Box::new(MemoryStateStore::new())
    } else {
        info!("State directory: {}", core.state.data_dir);
        Box::new(FileStateStore::new(&core.state.data_dir).await?)
    };

    let factory = CloudflareFactory::new(&core.cloudflare_api_url, config.is_dry_run());
    let reconciler = Reconciler::new(core.zones.clone(), &core.records, core.reconcile, &factory)?;

    for zone in reconciler.resolver().zones() {
        info!("Managing zone: {}", zone.domain);
    }

    Ok(CycleDriver::new(
        Box::new(ip_source),
        Box::new(host_source),
        state_store,
        reconciler,
    ))
}

fn log_report(report: &CycleReport) {
    let reconcile = &report.reconcile;
    info!(
        "Cycle finished in {}ms ({}): public IP {}, {} domain(s), {} created, {} updated, {} deleted, {} failed",
        (report.finished_at - report.started_at).num_milliseconds(),
        reconcile.outcome,
        report.public_ip,
        report.domain_count,
        reconcile.created.len(),
        reconcile.updated.len(),
        reconcile.deleted.len(),
        reconcile.failures.len()
    );
    for failure in &reconcile.failures {
        warn!(
            "Failed to {} {}: {}",
            failure.operation, failure.domain, failure.error
        );
    }
}

/// Install SIGTERM/SIGINT handlers and return a future resolving on either
///
/// Handlers are installed before the first cycle so a signal arriving
/// mid-cycle is not lost.
#[cfg(unix)]
async fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Fallback implementation for non-Unix platforms (CTRL-C only)
#[cfg(not(unix))]
async fn shutdown_signal() -> Result<impl std::future::Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal: CTRL-C"),
            Err(e) => error!("Failed to wait for CTRL-C: {}", e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(NpmdnsExitCode::CleanShutdown as u8, 0);
        assert_eq!(NpmdnsExitCode::ConfigError as u8, 1);
        assert_eq!(NpmdnsExitCode::CycleAborted as u8, 2);
    }

    #[tokio::test]
    async fn test_dry_run_driver_builds_without_data_dir() {
        let config = DaemonConfig::from_lookup(|key| {
            let value = match key {
                "NPMDNS_NPM_URL" => "http://127.0.0.1:9",
                "NPMDNS_NPM_USER" => "admin@example.com",
                "NPMDNS_NPM_PASSWORD" => "changeme",
                "NPMDNS_ZONES" => r#"[{"domain":"example.com","api_token":"t","zone_id":"z"}]"#,
                "NPMDNS_DATA_DIR" => "/nonexistent/npmdns-test",
                "NPMDNS_MODE" => "dry-run",
                _ => return None,
            };
            Some(value.to_string())
        })
        .expect("config");

        assert!(build_driver(&config).await.is_ok());
    }
}
