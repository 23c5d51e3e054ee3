// # Host Source Trait
//
// Defines the interface for listing the hostnames currently exposed by the
// reverse proxy.
//
// ## Implementations
//
// - Nginx Proxy Manager: `npmdns-hosts-npm` crate

use async_trait::async_trait;

use super::state_store::DomainSet;

/// Trait for proxy-host listing
///
/// Both calls are single remote requests. A failure of either one is fatal
/// for the current cycle: without the full domain set no diff is meaningful,
/// so there is no per-host recovery.
#[async_trait]
pub trait HostSource: Send + Sync {
    /// Obtain a session token
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: bearer token for [`HostSource::list_domains`]
    /// - `Err(Error::Authentication)`: login rejected or unreachable
    async fn authenticate(&self) -> Result<String, crate::Error>;

    /// List every domain name across all proxy hosts
    ///
    /// Names are normalized (see [`normalize_hostname`](crate::resolver::normalize_hostname)).
    async fn list_domains(&self, token: &str) -> Result<DomainSet, crate::Error>;

    /// Authenticate and list in one go
    async fn current_domains(&self) -> Result<DomainSet, crate::Error> {
        let token = self.authenticate().await?;
        self.list_domains(&token).await
    }

    /// Name of the source (for logging)
    fn source_name(&self) -> &'static str;
}
