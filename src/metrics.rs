//! Metrics instrumentation for geo-cdn-dns.
//!
//! All metrics are prefixed with `geo_cdn_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a DNS query.
pub fn record_query(record_type: &str, result: QueryResult, duration: std::time::Duration) {
    let result_str = match result {
        QueryResult::Success => "success",
        QueryResult::NoData => "nodata",
        QueryResult::NxDomain => "nxdomain",
        QueryResult::NoReplica => "no_replica",
    };

    counter!("geo_cdn_dns.query.count", "type" => record_type.to_string(), "result" => result_str)
        .increment(1);
    histogram!("geo_cdn_dns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// Query result type for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryResult {
    /// Query returned records successfully.
    Success,
    /// Name exists but has no records of the requested type.
    NoData,
    /// Domain not found.
    NxDomain,
    /// No replica could be located for the client.
    NoReplica,
}

/// Record the outcome of a single provider attempt.
pub fn record_geo_lookup(provider: &str, result: &'static str) {
    counter!("geo_cdn_dns.geo.lookup.count", "provider" => provider.to_string(), "result" => result)
        .increment(1);
}

/// Record a coordinate cache hit.
pub fn record_geo_cache_hit() {
    counter!("geo_cdn_dns.geo.cache.hit.count").increment(1);
}

/// Record a coordinate cache miss.
pub fn record_geo_cache_miss() {
    counter!("geo_cdn_dns.geo.cache.miss.count").increment(1);
}

/// Record a replica hostname resolution failure.
pub fn record_host_resolution_failure(hostname: &str) {
    counter!("geo_cdn_dns.replica.resolve_failure.count", "hostname" => hostname.to_string())
        .increment(1);
}

/// Outcome of a `select_closest` call.
#[derive(Debug, Clone, Copy)]
pub enum SelectionResult {
    /// Served from the client selection cache.
    Cached,
    /// Computed and cached.
    Selected,
    /// No replica had a finite distance.
    Unreachable,
}

/// Record a selection and, when one was made, its distance.
pub fn record_selection(result: SelectionResult, distance_km: Option<f64>) {
    let result_str = match result {
        SelectionResult::Cached => "cached",
        SelectionResult::Selected => "selected",
        SelectionResult::Unreachable => "unreachable",
    };

    counter!("geo_cdn_dns.selection.count", "result" => result_str).increment(1);
    if let Some(km) = distance_km {
        histogram!("geo_cdn_dns.selection.distance.km").record(km);
    }
}

/// Record cache sizes (call periodically).
pub fn record_cache_sizes(hostnames: usize, coordinates: usize, selections: usize) {
    gauge!("geo_cdn_dns.cache.hostnames.count").set(hostnames as f64);
    gauge!("geo_cdn_dns.cache.coordinates.count").set(coordinates as f64);
    gauge!("geo_cdn_dns.cache.selections.count").set(selections as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
