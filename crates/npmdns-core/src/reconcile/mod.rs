//! DNS record reconciler
//!
//! Given the current and previous domain sets, the current and previous public
//! IP and the ledger, the [`Reconciler`] works out which records to create,
//! update or delete and performs those calls one after another.
//!
//! ## Flow
//!
//! 1. Classify the cycle ([`ChangeSet::compute`]). A no-op cycle makes no
//!    remote calls at all.
//! 2. For every current domain (sorted), resolve its zone and pick an
//!    action: create, update or nothing.
//! 3. Create: adopt existing A-records if there are any, otherwise POST one.
//! 4. Update: rewrite the records that do not point at the current IP,
//!    creating one if none exist.
//! 5. Remove the records of deleted (and orphaned) domains.
//!
//! The ledger entry of a domain only changes when every call for that domain
//! succeeded. A failed domain keeps its stale entry, which is what makes the
//! next cycle try again (see [`ChangeSet::stale`]). Failures are reported,
//! never propagated.

pub mod plan;

pub use plan::{ChangeSet, CycleOutcome, DomainAction, ReconcileInput};

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::{debug, error, info, warn};

use crate::config::{ReconcileConfig, RecordSettings, ZoneConfig};
use crate::error::Result;
use crate::resolver::DomainResolver;
use crate::traits::dns_provider::{DnsProvider, DnsProviderFactory};
use crate::traits::state_store::DomainIpMap;

/// Kind of provider write that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Create-or-adopt of a new domain
    Create,
    /// Rewrite of a known domain
    Update,
    /// Removal of a deleted or orphaned domain
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A per-domain failure that was logged and isolated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainFailure {
    pub domain: String,
    pub operation: Operation,
    pub error: String,
}

/// What a reconciliation pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Classification of the cycle
    pub outcome: CycleOutcome,
    /// Ledger to persist
    pub ledger: DomainIpMap,
    /// Domains for which a record was created
    pub created: Vec<String>,
    /// Domains for which at least one record was rewritten
    pub updated: Vec<String>,
    /// Domains whose records already pointed at the current IP
    pub unchanged: Vec<String>,
    /// Domains whose records were removed
    pub deleted: Vec<String>,
    /// Domains with no configured zone
    pub skipped: Vec<String>,
    /// Domains where a provider call failed
    pub failures: Vec<DomainFailure>,
}

impl ReconcileReport {
    fn new(outcome: CycleOutcome, ledger: DomainIpMap) -> Self {
        Self {
            outcome,
            ledger,
            created: Vec::new(),
            updated: Vec::new(),
            unchanged: Vec::new(),
            deleted: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// True when the cycle made no remote calls and needs no save
    pub fn is_noop(&self) -> bool {
        self.outcome == CycleOutcome::NoOp
    }

    /// True when at least one domain failed
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn fail(&mut self, domain: &str, operation: Operation, error: &crate::Error) {
        self.failures.push(DomainFailure {
            domain: domain.to_string(),
            operation,
            error: error.to_string(),
        });
    }
}

/// Result of a create-or-update for one domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upsert {
    Created,
    Updated,
    Unchanged,
}

/// Reconciles proxy-host domains against provider A-records
///
/// One provider instance is created per configured zone up front; the
/// resolver decides which one a hostname goes through.
pub struct Reconciler {
    resolver: DomainResolver,
    /// Keyed by normalized root domain
    providers: HashMap<String, Box<dyn DnsProvider>>,
    reconcile_orphans: bool,
}

impl Reconciler {
    /// Create a reconciler with one provider per zone
    ///
    /// # Parameters
    ///
    /// - `zones`: configured root domains and credentials
    /// - `settings`: TTL / proxied flag for written records
    /// - `reconcile`: matching mode and orphan handling
    /// - `factory`: builds a provider for each zone
    pub fn new(
        zones: Vec<ZoneConfig>,
        settings: &RecordSettings,
        reconcile: ReconcileConfig,
        factory: &dyn DnsProviderFactory,
    ) -> Result<Self> {
        let mut providers = HashMap::with_capacity(zones.len());
        for zone in &zones {
            let provider = factory.create(zone, settings)?;
            debug!(
                "Created {} provider for zone {}",
                provider.provider_name(),
                zone.domain
            );
            providers.insert(zone.normalized_domain(), provider);
        }

        Ok(Self {
            resolver: DomainResolver::new(zones, reconcile.suffix_match),
            providers,
            reconcile_orphans: reconcile.reconcile_orphans,
        })
    }

    /// The resolver in use
    pub fn resolver(&self) -> &DomainResolver {
        &self.resolver
    }

    fn provider_for(&self, domain: &str) -> Option<&dyn DnsProvider> {
        let zone = self.resolver.resolve(domain)?;
        self.providers
            .get(&zone.normalized_domain())
            .map(|p| p.as_ref())
    }

    /// Run one reconciliation pass
    ///
    /// Never fails: per-domain errors end up in [`ReconcileReport::failures`]
    /// and leave the corresponding ledger entry untouched.
    pub async fn reconcile(&self, input: ReconcileInput<'_>) -> ReconcileReport {
        let changes = ChangeSet::compute(&input, self.reconcile_orphans, |domain| {
            self.resolver.resolve(domain).is_some()
        });
        let outcome = changes.outcome();
        let mut report = ReconcileReport::new(outcome, input.ledger.clone());

        if outcome == CycleOutcome::NoOp {
            info!("No changes detected. Skipping update cycle.");
            return report;
        }

        if changes.domains_changed() {
            info!(
                "Domain changes detected: {} new, {} removed, {} orphaned",
                changes.created.len(),
                changes.deleted.len(),
                changes.orphaned.len()
            );
        }
        if !changes.stale.is_empty() {
            info!("{} domain(s) lag behind the current IP", changes.stale.len());
        }
        if changes.ip_changed {
            match input.previous_ip {
                Some(previous) => info!("IP change detected: {} -> {}", previous, input.current_ip),
                None => info!("Initial IP detection: {}", input.current_ip),
            }
        }

        for domain in input.current_domains {
            let Some(provider) = self.provider_for(domain) else {
                warn!("Skipping domain {}: no DNS zone configured", domain);
                report.skipped.push(domain.clone());
                continue;
            };

            let action = changes.action_for(domain, &report.ledger);
            let operation = match action {
                DomainAction::Create => {
                    info!(
                        "New domain {}: creating A record with IP {}",
                        domain, input.current_ip
                    );
                    Operation::Create
                }
                DomainAction::Update => {
                    if changes.ip_changed {
                        info!("Updating {} with new IP {}", domain, input.current_ip);
                    } else if changes.stale.contains(domain) {
                        info!("Retrying update for {} with IP {}", domain, input.current_ip);
                    } else {
                        info!("Forced update for {} with IP {}", domain, input.current_ip);
                    }
                    Operation::Update
                }
                DomainAction::None => {
                    debug!("No changes needed for {}", domain);
                    report.unchanged.push(domain.clone());
                    continue;
                }
            };

            match self
                .upsert(provider, domain, input.current_ip, action)
                .await
            {
                Ok(result) => {
                    report.ledger.insert(domain.clone(), input.current_ip);
                    match result {
                        Upsert::Created => report.created.push(domain.clone()),
                        Upsert::Updated => report.updated.push(domain.clone()),
                        Upsert::Unchanged => report.unchanged.push(domain.clone()),
                    }
                }
                Err(e) => {
                    error!("Failed to {} A record for {}: {}", operation, domain, e);
                    report.fail(domain, operation, &e);
                }
            }
        }

        for domain in changes.removals() {
            let Some(provider) = self.provider_for(domain) else {
                debug!("Dropping {} from ledger: no DNS zone configured", domain);
                report.ledger.remove(domain);
                report.skipped.push(domain.clone());
                continue;
            };

            info!("Deleting DNS records for removed domain: {}", domain);
            match self.remove(provider, domain).await {
                Ok(_) => {
                    report.ledger.remove(domain);
                    report.deleted.push(domain.clone());
                }
                Err(e) => {
                    error!("Failed to delete A record for {}: {}", domain, e);
                    report.fail(domain, Operation::Delete, &e);
                }
            }
        }

        info!(
            "Reconciliation finished ({}): {} created, {} updated, {} unchanged, {} deleted, {} skipped, {} failed",
            outcome,
            report.created.len(),
            report.updated.len(),
            report.unchanged.len(),
            report.deleted.len(),
            report.skipped.len(),
            report.failures.len()
        );

        report
    }

    /// Create-or-update the A-records of `domain`
    async fn upsert(
        &self,
        provider: &dyn DnsProvider,
        domain: &str,
        ip: Ipv4Addr,
        action: DomainAction,
    ) -> Result<Upsert> {
        let existing = provider.find_a_records(domain).await?;

        if existing.is_empty() {
            if action == DomainAction::Update {
                info!("No A record found for {} to update, creating one", domain);
            }
            provider.create_a_record(domain, ip).await?;
            info!("A record created for {} with IP {}", domain, ip);
            return Ok(Upsert::Created);
        }

        if action == DomainAction::Create {
            info!("A record already exists for {}, checking for update", domain);
        }

        let mut rewritten = 0usize;
        let mut first_error = None;
        for record in &existing {
            if record.points_to(ip) {
                debug!("A record for {} already has the correct IP {}", domain, ip);
                continue;
            }

            match provider.update_a_record(&record.id, domain, ip).await {
                Ok(_) => {
                    info!(
                        "A record updated for {}: {} -> {}",
                        domain, record.content, ip
                    );
                    rewritten += 1;
                }
                Err(e) => {
                    warn!("Update of record {} for {} failed: {}", record.id, domain, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None if rewritten > 0 => Ok(Upsert::Updated),
            None => Ok(Upsert::Unchanged),
        }
    }

    /// Delete every A-record of `domain`, returning how many were removed
    async fn remove(&self, provider: &dyn DnsProvider, domain: &str) -> Result<usize> {
        let existing = provider.find_a_records(domain).await?;

        if existing.is_empty() {
            info!("No A record found for {}", domain);
            return Ok(0);
        }

        let mut removed = 0usize;
        let mut first_error = None;
        for record in &existing {
            match provider.delete_record(&record.id).await {
                Ok(()) => {
                    info!("A record {} deleted for {}", record.id, domain);
                    removed += 1;
                }
                Err(e) => {
                    warn!("Delete of record {} for {} failed: {}", record.id, domain, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut zones: Vec<_> = self.providers.keys().collect();
        zones.sort();
        f.debug_struct("Reconciler")
            .field("zones", &zones)
            .field("suffix_match", &self.resolver.mode())
            .field("reconcile_orphans", &self.reconcile_orphans)
            .finish()
    }
}
