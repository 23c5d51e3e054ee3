//! Core traits for npmdns
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpSource`]: Look up the current public IP
//! - [`HostSource`]: List the reverse proxy's hostnames
//! - [`DnsProvider`]: Read and write A-records in one zone
//! - [`StateStore`]: Persist the domain set, ledger and public IP

pub mod dns_provider;
pub mod host_source;
pub mod ip_source;
pub mod state_store;

pub use dns_provider::{DnsProvider, DnsProviderFactory, DnsRecord};
pub use host_source::HostSource;
pub use ip_source::IpSource;
pub use state_store::{DomainIpMap, DomainSet, StateSnapshot, StateStore};
