//! Replica hostname resolution, memoized for the process lifetime.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::DnsError;
use crate::metrics;

/// Resolves a hostname to a single address.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve `hostname` to one address.
    async fn resolve(&self, hostname: &str) -> Result<IpAddr, DnsError>;
}

/// Resolver backed by the operating system (`getaddrinfo`).
///
/// Prefers the first IPv4 address, falling back to the first address of any
/// family.
#[derive(Debug, Clone)]
pub struct SystemHostResolver {
    timeout: Duration,
}

impl SystemHostResolver {
    /// Create a resolver that gives up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl HostResolver for SystemHostResolver {
    async fn resolve(&self, hostname: &str) -> Result<IpAddr, DnsError> {
        let failure = |reason: String| DnsError::HostResolution {
            hostname: hostname.to_string(),
            reason,
        };

        let addrs: Vec<IpAddr> =
            tokio::time::timeout(self.timeout, tokio::net::lookup_host((hostname, 0)))
                .await
                .map_err(|_| failure(format!("timed out after {:?}", self.timeout)))?
                .map_err(|e| failure(e.to_string()))?
                .map(|sa| sa.ip())
                .collect();

        addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| failure("no addresses returned".to_string()))
    }
}

/// Append-only hostname -> address cache in front of a [`HostResolver`].
///
/// Failures are not cached. Clones share the cache.
#[derive(Clone)]
pub struct HostnameCache {
    resolver: Arc<dyn HostResolver>,
    entries: Arc<RwLock<HashMap<String, IpAddr>>>,
}

impl HostnameCache {
    /// Create an empty cache over `resolver`.
    pub fn new(resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            resolver,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Address for `hostname`, resolving and memoizing on first use.
    pub async fn lookup(&self, hostname: &str) -> Option<IpAddr> {
        if let Some(ip) = self.entries.read().get(hostname).copied() {
            return Some(ip);
        }

        match self.resolver.resolve(hostname).await {
            Ok(ip) => {
                debug!(hostname, %ip, "resolved replica hostname");
                let mut entries = self.entries.write();
                Some(*entries.entry(hostname.to_string()).or_insert(ip))
            }
            Err(e) => {
                warn!(hostname, error = %e, "replica hostname resolution failed");
                metrics::record_host_resolution_failure(hostname);
                None
            }
        }
    }

    /// Number of memoized hostnames.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if nothing has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
