//! Pure change classification
//!
//! Everything in here is synchronous and free of I/O so the decision logic
//! can be tested without providers.

use std::fmt;
use std::net::Ipv4Addr;

use crate::traits::state_store::{DomainIpMap, DomainSet};

/// Why a cycle does (or does not) touch the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing changed and no refresh was requested
    NoOp,
    /// Domains appeared or disappeared
    DomainsChanged,
    /// The public IP moved
    IpChanged,
    /// Some ledger entries lag behind the current IP (an earlier write failed)
    Stale,
    /// Periodic refresh with no detected change
    Forced,
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoOp => "no-op",
            Self::DomainsChanged => "domains-changed",
            Self::IpChanged => "ip-changed",
            Self::Stale => "stale-ledger",
            Self::Forced => "forced",
        };
        f.write_str(s)
    }
}

/// What to do for one current domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainAction {
    /// New to us: create, or adopt an existing record
    Create,
    /// Known: rewrite records that do not point at the current IP
    Update,
    /// Ledger is current and nothing forces a rewrite
    None,
}

/// Inputs to a reconciliation pass
#[derive(Debug, Clone, Copy)]
pub struct ReconcileInput<'a> {
    /// Domains the proxy exposes right now
    pub current_domains: &'a DomainSet,
    /// Domains persisted at the end of the last non-idle cycle
    pub previous_domains: &'a DomainSet,
    /// Public IP right now
    pub current_ip: Ipv4Addr,
    /// Public IP persisted at the end of the last non-idle cycle
    pub previous_ip: Option<Ipv4Addr>,
    /// What we last told the provider
    pub ledger: &'a DomainIpMap,
    /// Rewrite every domain regardless of change
    pub force: bool,
}

/// Result of diffing one cycle's inputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// current − previous
    pub created: DomainSet,
    /// previous − current
    pub deleted: DomainSet,
    /// Ledger entries with no current domain that were not already deleted
    pub orphaned: DomainSet,
    /// Known, managed domains whose ledger entry is missing or differs from
    /// the current IP
    pub stale: DomainSet,
    /// Public IP differs from the persisted one (or none was persisted)
    pub ip_changed: bool,
    /// Refresh requested by the scheduler
    pub forced: bool,
}

impl ChangeSet {
    /// Diff the inputs
    ///
    /// `reconcile_orphans` adds ledger entries that no longer correspond to a
    /// current domain to the removal list. Without it a deletion that failed
    /// once is never retried, because the persisted domain set moves on.
    ///
    /// `managed` tells whether a domain has a zone at all; unmanaged domains
    /// never have a ledger entry and must not count as stale.
    pub fn compute(
        input: &ReconcileInput<'_>,
        reconcile_orphans: bool,
        managed: impl Fn(&str) -> bool,
    ) -> Self {
        let created: DomainSet = input
            .current_domains
            .difference(input.previous_domains)
            .cloned()
            .collect();
        let deleted: DomainSet = input
            .previous_domains
            .difference(input.current_domains)
            .cloned()
            .collect();

        let orphaned = if reconcile_orphans {
            input
                .ledger
                .keys()
                .filter(|d| !input.current_domains.contains(*d) && !deleted.contains(*d))
                .cloned()
                .collect()
        } else {
            DomainSet::new()
        };

        let stale = input
            .current_domains
            .iter()
            .filter(|d| !created.contains(*d) && managed(d.as_str()))
            .filter(|d| input.ledger.get(*d) != Some(&input.current_ip))
            .cloned()
            .collect();

        Self {
            created,
            deleted,
            orphaned,
            stale,
            ip_changed: input.previous_ip != Some(input.current_ip),
            forced: input.force,
        }
    }

    /// Any domain added, removed or orphaned
    pub fn domains_changed(&self) -> bool {
        !self.created.is_empty() || !self.deleted.is_empty() || !self.orphaned.is_empty()
    }

    /// Classify the cycle
    ///
    /// Precedence when several apply: IP change, domain change, stale ledger,
    /// forced refresh.
    pub fn outcome(&self) -> CycleOutcome {
        if self.ip_changed {
            CycleOutcome::IpChanged
        } else if self.domains_changed() {
            CycleOutcome::DomainsChanged
        } else if !self.stale.is_empty() {
            CycleOutcome::Stale
        } else if self.forced {
            CycleOutcome::Forced
        } else {
            CycleOutcome::NoOp
        }
    }

    /// Decide what to do for a current domain
    pub fn action_for(&self, domain: &str, ledger: &DomainIpMap) -> DomainAction {
        if self.created.contains(domain) || !ledger.contains_key(domain) {
            DomainAction::Create
        } else if self.ip_changed || self.forced || self.stale.contains(domain) {
            DomainAction::Update
        } else {
            DomainAction::None
        }
    }

    /// Domains whose records must be removed, in sorted order
    pub fn removals(&self) -> impl Iterator<Item = &String> {
        self.deleted.union(&self.orphaned)
    }
}
