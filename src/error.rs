//! Error types for geo-cdn-dns.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error (building the geolocation client)
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration could not be loaded or deserialized
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Replica hostname could not be resolved
    #[error("Failed to resolve {hostname}: {reason}")]
    HostResolution {
        /// Hostname that failed to resolve.
        hostname: String,
        /// Why resolution failed.
        reason: String,
    },
}

/// A single failed geolocation attempt against one provider.
///
/// These never leave the coordinate resolver; they decide whether the next
/// provider is tried and end up in logs and metrics.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Transport-level failure (connect, TLS, body read).
    #[error("request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// The provider did not answer within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The provider answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The body was not JSON or lacked numeric `latitude`/`longitude`.
    #[error("malformed response body: {0}")]
    Body(String),
}

impl GeoError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GeoError::Http(_) => "http",
            GeoError::Timeout(_) => "timeout",
            GeoError::Status(_) => "status",
            GeoError::Body(_) => "body",
        }
    }
}
