//! Error types for npmdns
//!
//! Errors fall into three classes as far as a reconciliation cycle is
//! concerned:
//!
//! - **Fatal for the cycle**: the public IP, the proxy-host listing or the
//!   persisted state could not be obtained. The cycle aborts before any DNS
//!   write. See [`Error::is_fatal_for_cycle`].
//! - **Per-domain**: a DNS provider call failed for one hostname. These are
//!   logged by the reconciler and never leave it.
//! - **Configuration**: rejected at startup.

use thiserror::Error;

/// Result type alias for npmdns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for npmdns
#[derive(Error, Debug)]
pub enum Error {
    /// Public IP lookup failed
    #[error("IP source error: {0}")]
    IpSource(String),

    /// Proxy-host listing failed
    #[error("Host source error: {0}")]
    HostSource(String),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record or zone not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create an IP source error
    pub fn ip_source(msg: impl Into<String>) -> Self {
        Self::IpSource(msg.into())
    }

    /// Create a host source error
    pub fn host_source(msg: impl Into<String>) -> Self {
        Self::HostSource(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error is an expected reason for a cycle to abort
    ///
    /// The cycle driver logs anything else that escapes a cycle as
    /// unexpected. Provider errors are handled per domain inside the
    /// reconciler and never reach it.
    pub fn is_fatal_for_cycle(&self) -> bool {
        matches!(
            self,
            Self::IpSource(_) | Self::HostSource(_) | Self::Authentication(_) | Self::StateStore(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failures_are_fatal_for_cycle() {
        assert!(Error::ip_source("timeout").is_fatal_for_cycle());
        assert!(Error::host_source("502").is_fatal_for_cycle());
        assert!(Error::auth("bad password").is_fatal_for_cycle());
    }

    #[test]
    fn provider_failures_are_not_fatal() {
        assert!(!Error::provider("cloudflare", "500").is_fatal_for_cycle());
        assert!(!Error::not_found("record").is_fatal_for_cycle());
        assert!(!Error::rate_limited("slow down").is_fatal_for_cycle());
    }

    #[test]
    fn provider_error_display() {
        let err = Error::provider("cloudflare", "zone locked");
        assert_eq!(err.to_string(), "Provider error (cloudflare): zone locked");
    }
}
