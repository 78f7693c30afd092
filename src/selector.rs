//! Closest-replica selection.
//!
//! For a client address, every configured replica is located and the one with
//! the smallest great-circle distance wins. Replicas are scanned in configured
//! order and the running minimum is only replaced on a strictly smaller
//! distance, so the earliest replica wins ties.
//!
//! ```text
//! client ip ──▶ selection cache ──hit──▶ Selection
//!                    │ miss
//!                    ▼
//!   coordinate resolver(client) ──none──▶ None (not cached)
//!   for hostname in replicas (in order):
//!       hostname cache ──▶ replica ip
//!       coordinate resolver(replica)
//!       haversine ──▶ keep strict minimum
//!                    │
//!                    ▼
//!   finite minimum? ──yes──▶ cache + return
//!                   └─no───▶ None (not cached)
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::DnsError;
use crate::geo;
use crate::hostname::{HostResolver, HostnameCache, SystemHostResolver};
use crate::metrics::{self, SelectionResult};
use crate::provider;
use crate::resolver::CoordinateResolver;

/// A replica server with its resolved address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replica {
    /// Configured hostname.
    pub hostname: String,
    /// Address the hostname resolved to.
    pub addr: IpAddr,
}

/// The closest replica for a client.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Chosen replica.
    pub replica: Replica,
    /// Great-circle distance from the client, always finite.
    pub distance_km: f64,
}

/// Picks the geographically closest replica for client addresses.
///
/// Owns the hostname, coordinate and client selection caches. Clones share
/// them, so a single selector can be handed to every query handler.
#[derive(Clone)]
pub struct ReplicaSelector {
    hostnames: Arc<Vec<String>>,
    hosts: HostnameCache,
    coordinates: CoordinateResolver,
    /// client ip -> Selection, append-only
    selections: Arc<RwLock<HashMap<IpAddr, Selection>>>,
}

impl ReplicaSelector {
    /// Create a selector over `hostnames`, scanned in the given order.
    pub fn new(
        hostnames: Vec<String>,
        host_resolver: Arc<dyn HostResolver>,
        coordinates: CoordinateResolver,
    ) -> Self {
        Self {
            hostnames: Arc::new(hostnames),
            hosts: HostnameCache::new(host_resolver),
            coordinates,
            selections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Build a selector from configuration, using HTTP providers and the
    /// system resolver.
    pub fn from_config(config: &Config) -> Result<Self, DnsError> {
        let providers = provider::build_providers(&config.geo)?;
        let host_resolver = Arc::new(SystemHostResolver::new(config.geo.request_timeout()));

        info!(
            replicas = config.replicas.hostnames.len(),
            providers = providers.len(),
            timeout_ms = config.geo.request_timeout_ms,
            "built replica selector"
        );

        Ok(Self::new(
            config.replicas.hostnames.clone(),
            host_resolver,
            CoordinateResolver::new(providers),
        ))
    }

    /// Closest replica for `client`, or `None` if no replica could be
    /// located relative to it.
    ///
    /// A successful selection is cached for the lifetime of the selector;
    /// an unsuccessful one is not, so later calls retry.
    pub async fn select_closest(&self, client: IpAddr) -> Option<Selection> {
        if let Some(selection) = self.cached(client) {
            metrics::record_selection(SelectionResult::Cached, Some(selection.distance_km));
            return Some(selection);
        }

        let Some(client_coord) = self.coordinates.resolve(client).await else {
            warn!(%client, "client could not be located");
            metrics::record_selection(SelectionResult::Unreachable, None);
            return None;
        };

        let mut best: Option<Selection> = None;
        let mut best_distance = f64::INFINITY;

        for hostname in self.hostnames.iter() {
            let Some(addr) = self.hosts.lookup(hostname).await else {
                continue;
            };

            let replica_coord = self.coordinates.resolve(addr).await;
            let distance = geo::distance(Some(client_coord), replica_coord);

            debug!(%client, replica = %hostname, %addr, distance_km = distance, "replica distance");

            if distance < best_distance {
                best_distance = distance;
                best = Some(Selection {
                    replica: Replica {
                        hostname: hostname.clone(),
                        addr,
                    },
                    distance_km: distance,
                });
            }
        }

        match best {
            Some(selection) => {
                info!(
                    %client,
                    replica = %selection.replica.hostname,
                    addr = %selection.replica.addr,
                    distance_km = selection.distance_km,
                    "selected closest replica"
                );
                metrics::record_selection(SelectionResult::Selected, Some(selection.distance_km));
                let mut selections = self.selections.write();
                Some(selections.entry(client).or_insert(selection).clone())
            }
            None => {
                warn!(%client, "no replica reachable");
                metrics::record_selection(SelectionResult::Unreachable, None);
                None
            }
        }
    }

    /// Cached selection for `client`, without any lookups.
    pub fn cached(&self, client: IpAddr) -> Option<Selection> {
        self.selections.read().get(&client).cloned()
    }

    /// Configured replica hostnames in scan order.
    pub fn hostnames(&self) -> &[String] {
        &self.hostnames
    }

    /// Emit cache size metrics.
    pub fn emit_metrics(&self) {
        metrics::record_cache_sizes(
            self.hosts.len(),
            self.coordinates.cache_len(),
            self.selections_count(),
        );
    }

    /// Number of cached client selections.
    pub fn selections_count(&self) -> usize {
        self.selections.read().len()
    }

    /// Number of cached replica addresses.
    pub fn hostnames_count(&self) -> usize {
        self.hosts.len()
    }

    /// Number of cached coordinates.
    pub fn coordinates_count(&self) -> usize {
        self.coordinates.cache_len()
    }
}
