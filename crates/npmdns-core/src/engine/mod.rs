//! Cycle driver
//!
//! The CycleDriver is responsible for:
//! - Loading the persisted state at the start of a cycle
//! - Fetching the public IP and the proxy-host domains
//! - Handing both to the Reconciler
//! - Persisting the result at the end of the cycle
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │ StateStore  │   │  IpSource   │   │ HostSource  │
//! │ (load)      │   │ (current)   │   │ (domains)   │
//! └─────────────┘   └─────────────┘   └─────────────┘
//!        │                 │                 │
//!        └─────────────────┼─────────────────┘
//!                          ▼
//!                  ┌──────────────┐      ┌─────────────┐
//!                  │  Reconciler  │─────▶│ DnsProvider │
//!                  └──────────────┘      └─────────────┘
//!                          │
//!                          ▼
//!                  ┌──────────────┐
//!                  │ StateStore   │
//!                  │ (save)       │
//!                  └──────────────┘
//! ```
//!
//! ## Failure handling
//!
//! A failure to load state, fetch the IP or list the hosts aborts the cycle
//! before any DNS write and before anything is saved. Per-domain provider
//! failures are absorbed by the reconciler; the cycle still saves.
//!
//! ## Scheduling
//!
//! [`CycleDriver::run_until`] runs cycles back to back with a sleep between
//! them, following a [`Scheduler`]. A cycle is never interrupted; shutdown is
//! only observed while sleeping.

pub mod scheduler;

pub use scheduler::Scheduler;

use chrono::{DateTime, Utc};
use std::future::Future;
use std::net::Ipv4Addr;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::reconcile::{ReconcileInput, ReconcileReport, Reconciler};
use crate::traits::{HostSource, IpSource, StateSnapshot, StateStore};

/// Summary of one completed cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// When the cycle started
    pub started_at: DateTime<Utc>,
    /// When the cycle finished
    pub finished_at: DateTime<Utc>,
    /// Public IP observed during the cycle
    pub public_ip: Ipv4Addr,
    /// Number of domains the proxy listed
    pub domain_count: usize,
    /// Whether the cycle was a forced refresh
    pub forced: bool,
    /// Whether state was written at the end of the cycle
    pub persisted: bool,
    /// What the reconciler did
    pub reconcile: ReconcileReport,
}

/// Runs reconciliation cycles
///
/// Owns every collaborator; the reconciler never touches the state store.
pub struct CycleDriver {
    ip_source: Box<dyn IpSource>,
    host_source: Box<dyn HostSource>,
    state_store: Box<dyn StateStore>,
    reconciler: Reconciler,
}

impl CycleDriver {
    /// Create a new cycle driver
    pub fn new(
        ip_source: Box<dyn IpSource>,
        host_source: Box<dyn HostSource>,
        state_store: Box<dyn StateStore>,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            ip_source,
            host_source,
            state_store,
            reconciler,
        }
    }

    /// Run one reconciliation cycle
    ///
    /// # Parameters
    ///
    /// - `force`: rewrite every resolvable domain even if nothing changed
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: the cycle completed, possibly with per-domain
    ///   failures listed in the report
    /// - `Err(Error)`: the cycle aborted; nothing was written to DNS or disk,
    ///   unless the final save itself failed
    pub async fn run_cycle(&self, force: bool) -> Result<CycleReport> {
        let started_at = Utc::now();

        let snapshot = self.state_store.load().await?;
        if snapshot.is_first_run() {
            info!("No previous state found, treating every domain as new");
        }

        let current_ip = self.ip_source.current().await.inspect_err(|e| {
            error!(
                "Could not retrieve public IP from {}, aborting cycle: {}",
                self.ip_source.source_name(),
                e
            )
        })?;

        let current_domains = self.host_source.current_domains().await.inspect_err(|e| {
            error!(
                "Could not list proxy hosts from {}, aborting cycle: {}",
                self.host_source.source_name(),
                e
            )
        })?;
        let domain_count = current_domains.len();
        debug!(
            "Public IP {}, {} proxy host domain(s)",
            current_ip, domain_count
        );

        let report = self
            .reconciler
            .reconcile(ReconcileInput {
                current_domains: &current_domains,
                previous_domains: &snapshot.domains,
                current_ip,
                previous_ip: snapshot.public_ip,
                ledger: &snapshot.ledger,
                force,
            })
            .await;

        let persisted = if report.is_noop() {
            false
        } else {
            self.state_store
                .save(&StateSnapshot {
                    domains: current_domains,
                    ledger: report.ledger.clone(),
                    public_ip: Some(current_ip),
                })
                .await
                .inspect_err(|e| error!("Failed to persist state: {}", e))?;
            debug!("State persisted: {} domains", domain_count);
            true
        };

        Ok(CycleReport {
            started_at,
            finished_at: Utc::now(),
            public_ip: current_ip,
            domain_count,
            forced: force,
            persisted,
            reconcile: report,
        })
    }

    /// Run cycles until `shutdown` resolves
    ///
    /// The first cycle starts immediately. Each cycle runs to completion (or
    /// aborts) before the scheduler's delay starts; `shutdown` is only
    /// observed during that delay.
    pub async fn run_until<F>(&self, mut scheduler: Scheduler, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let force = scheduler.force_next();
            if force {
                info!("Starting forced refresh cycle");
            }

            let delay = match self.run_cycle(force).await {
                Ok(report) => {
                    if report.reconcile.has_failures() {
                        warn!(
                            "Cycle completed with {} failed domain(s)",
                            report.reconcile.failures.len()
                        );
                    }
                    scheduler.record_success()
                }
                Err(e) => {
                    if e.is_fatal_for_cycle() {
                        error!("Cycle aborted: {}", e);
                    } else {
                        error!("Cycle aborted by unexpected error: {}", e);
                    }
                    scheduler.record_failure()
                }
            };

            debug!("Next cycle in {:?}", delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!("Cycle driver stopped after {} cycle(s)", scheduler.cycles());
    }
}
