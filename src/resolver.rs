//! IP address to coordinate resolution with memoization.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::geo::Coordinate;
use crate::metrics;
use crate::provider::GeoProvider;

/// Resolves IP addresses to coordinates through an ordered provider list.
///
/// Successful lookups are kept for the lifetime of the resolver. Failures are
/// not cached, so the next call for the same address tries the providers
/// again. Clones share the cache.
#[derive(Clone)]
pub struct CoordinateResolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    providers: Vec<Arc<dyn GeoProvider>>,
    /// ip -> Coordinate, append-only
    cache: RwLock<HashMap<IpAddr, Coordinate>>,
}

impl CoordinateResolver {
    /// Create a resolver trying `providers` in the given order.
    pub fn new(providers: Vec<Arc<dyn GeoProvider>>) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                providers,
                cache: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Coordinate for `ip`, or `None` if no provider could locate it.
    pub async fn resolve(&self, ip: IpAddr) -> Option<Coordinate> {
        if let Some(coord) = self.cached(ip) {
            metrics::record_geo_cache_hit();
            return Some(coord);
        }
        metrics::record_geo_cache_miss();

        for provider in &self.inner.providers {
            match provider.locate(ip).await {
                Ok(coord) => {
                    debug!(
                        %ip,
                        provider = provider.name(),
                        latitude = coord.latitude,
                        longitude = coord.longitude,
                        "located ip"
                    );
                    metrics::record_geo_lookup(provider.name(), "success");
                    // A concurrent lookup may have won; keep whichever landed first.
                    let mut cache = self.inner.cache.write();
                    return Some(*cache.entry(ip).or_insert(coord));
                }
                Err(e) => {
                    debug!(%ip, provider = provider.name(), error = %e, "geolocation attempt failed");
                    metrics::record_geo_lookup(provider.name(), e.kind());
                }
            }
        }

        warn!(%ip, providers = self.inner.providers.len(), "no provider could locate ip");
        None
    }

    /// Cached coordinate for `ip`, without any network call.
    pub fn cached(&self, ip: IpAddr) -> Option<Coordinate> {
        self.inner.cache.read().get(&ip).copied()
    }

    /// Number of memoized coordinates.
    pub fn cache_len(&self) -> usize {
        self.inner.cache.read().len()
    }
}
