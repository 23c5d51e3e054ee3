// # npmdns-core
//
// Core library for keeping DNS A-records in sync with the hostnames exposed
// by an Nginx Proxy Manager instance.
//
// ## Architecture Overview
//
// - **IpSource**: Trait for looking up the current public IP
// - **HostSource**: Trait for listing the proxy's hostnames
// - **DnsProvider**: Trait for reading and writing A-records in one zone
// - **StateStore**: Trait for the persisted domain set, ledger and public IP
// - **Reconciler**: Diffs a cycle's inputs and performs the provider calls
// - **CycleDriver**: Runs cycles (load → observe → reconcile → save)
// - **Scheduler**: Polling, forced refresh and backoff policy
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Failure Isolation**: One failing domain never aborts the others
// 3. **Idempotency**: An unchanged cycle makes no provider calls at all
// 4. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod resolver;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    NpmConfig, NpmdnsConfig, ReconcileConfig, RecordSettings, ScheduleConfig, StateConfig,
    SuffixMatch, ZoneConfig,
};
pub use engine::{CycleDriver, CycleReport, Scheduler};
pub use error::{Error, Result};
pub use reconcile::{CycleOutcome, DomainFailure, Operation, ReconcileReport, Reconciler};
pub use resolver::{DomainResolver, normalize_hostname};
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{
    DnsProvider, DnsProviderFactory, DnsRecord, DomainIpMap, DomainSet, HostSource, IpSource,
    StateSnapshot, StateStore,
};
