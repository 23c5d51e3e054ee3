// # State Store Trait
//
// Defines the interface for the three durable artifacts a cycle works from:
//
// - the domain set seen at the end of the last cycle
// - the ledger: hostname → IP last successfully written to the provider
// - the public IP seen at the end of the last cycle
//
// ## Implementations
//
// - File-based: one file per artifact (`FileStateStore`)
// - In-memory: tests and dry runs (`MemoryStateStore`)
//
// ## Usage
//
// ```rust,ignore
// use npmdns_core::StateStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* StateStore implementation */;
//
//     let mut snapshot = store.load().await?;
//     snapshot.public_ip = Some("203.0.113.7".parse()?);
//     store.save(&snapshot).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

/// Set of fully qualified hostnames
pub type DomainSet = BTreeSet<String>;

/// Ledger of hostname → IP last successfully written
pub type DomainIpMap = BTreeMap<String, Ipv4Addr>;

/// In-memory view of the persisted artifacts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Domains seen at the end of the last non-idle cycle
    pub domains: DomainSet,
    /// What we last told the provider, per hostname
    pub ledger: DomainIpMap,
    /// Public IP at the end of the last non-idle cycle
    pub public_ip: Option<Ipv4Addr>,
}

impl StateSnapshot {
    /// True when nothing has ever been persisted
    pub fn is_first_run(&self) -> bool {
        self.domains.is_empty() && self.ledger.is_empty() && self.public_ip.is_none()
    }
}

/// Trait for state store implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage
/// - ✅ Degrade missing or corrupt artifacts to empty
///
/// ## Forbidden Capabilities
/// - ❌ Implement business logic (owned by the reconciler)
/// - ❌ Decide when to save (owned by the cycle driver)
///
/// Only one process may use a given store at a time; there is no locking.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load all artifacts
    ///
    /// Missing or corrupt artifacts come back empty/absent. An `Err` is
    /// reserved for conditions where the store cannot work at all.
    async fn load(&self) -> Result<StateSnapshot, crate::Error>;

    /// Persist all artifacts
    async fn save(&self, snapshot: &StateSnapshot) -> Result<(), crate::Error>;
}
