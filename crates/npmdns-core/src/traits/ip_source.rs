// # IP Source Trait
//
// Defines the interface for looking up the machine's current public IPv4
// address.
//
// ## Implementations
//
// - HTTP JSON service (ipify): `npmdns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use npmdns_core::IpSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//     let ip = source.current().await?;
//     println!("public IP: {}", ip);
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for public IP lookups
///
/// A pure lookup: one call, one answer, no state between calls.
///
/// # Failure
///
/// Any network, status or parse problem is returned as
/// [`Error::IpSource`](crate::Error::IpSource). The cycle driver aborts the
/// cycle without touching DNS or persisted state; the next attempt happens on
/// the next scheduled cycle.
///
/// ## Forbidden
/// - ❌ Retrying internally (retry cadence belongs to the scheduler)
/// - ❌ Caching an answer across calls
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Fetch the current public IPv4 address
    async fn current(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Name of the source (for logging)
    fn source_name(&self) -> &'static str;
}
