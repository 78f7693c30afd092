//! Configuration types for geo-cdn-dns.

use hickory_proto::rr::Name;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::DnsError;

/// Placeholder substituted with the IP address in provider URLs.
pub const IP_PLACEHOLDER: &str = "{ip}";

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "GEO_CDN_DNS";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    pub dns: DnsConfig,

    /// Geolocation provider configuration.
    #[serde(default)]
    pub geo: GeoConfig,

    /// Replica servers to choose between.
    #[serde(default)]
    pub replicas: ReplicaConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load configuration from a TOML file, with `GEO_CDN_DNS__*` environment
    /// overrides, and validate it.
    pub fn load(path: &Path) -> Result<Self, DnsError> {
        let config: Config = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), DnsError> {
        Name::from_ascii(&self.dns.cdn_name).map_err(|e| {
            DnsError::Config(format!("cdn_name {:?} is not a DNS name: {}", self.dns.cdn_name, e))
        })?;

        if self.replicas.hostnames.is_empty() {
            return Err(DnsError::Config("at least one replica hostname is required".into()));
        }

        if self.geo.providers.is_empty() {
            return Err(DnsError::Config("at least one geolocation provider is required".into()));
        }

        for provider in &self.geo.providers {
            if !provider.url.contains(IP_PLACEHOLDER) {
                return Err(DnsError::Config(format!(
                    "provider {} url {:?} has no {} placeholder",
                    provider.name, provider.url, IP_PLACEHOLDER
                )));
            }
        }

        if self.geo.request_timeout_ms == 0 {
            return Err(DnsError::Config("geo.request_timeout_ms must be positive".into()));
        }

        // SOA timers are signed 32-bit on the wire
        let soa = &self.dns.soa;
        for (field, value) in [("refresh", soa.refresh), ("retry", soa.retry), ("expire", soa.expire)] {
            if i32::try_from(value).is_err() {
                return Err(DnsError::Config(format!(
                    "dns.soa.{} {} exceeds {}",
                    field,
                    value,
                    i32::MAX
                )));
            }
        }

        Ok(())
    }
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for DNS server to listen on (UDP and TCP).
    pub listen_addr: SocketAddr,

    /// CDN hostname answered with the closest replica (e.g., "cdn.example.com").
    /// This is also the zone origin.
    pub cdn_name: String,

    /// TTL for DNS records in seconds.
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// SOA record configuration.
    #[serde(default)]
    pub soa: SoaConfig,
}

/// Geolocation lookup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    /// Upper bound for a single provider request or hostname resolution.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Providers, tried in order until one returns a coordinate.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl GeoConfig {
    /// Request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            providers: default_providers(),
        }
    }
}

/// A single HTTP geolocation provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name used in logs and metrics.
    pub name: String,

    /// URL template; `{ip}` is replaced by the address being located.
    pub url: String,
}

/// Replica server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Replica hostnames. Order matters: on equal distance the earlier one wins.
    #[serde(default = "default_replica_hostnames")]
    pub hostnames: Vec<String>,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            hostnames: default_replica_hostnames(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "geo_cdn_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,

    /// OTLP span export, used with the `otel` feature.
    #[serde(default)]
    pub opentelemetry: Option<OpenTelemetryConfig>,
}

/// OpenTelemetry exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTelemetryConfig {
    /// OTLP gRPC endpoint (e.g., "http://localhost:4317").
    pub endpoint: String,

    /// Service name attached to exported spans.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
            opentelemetry: None,
        }
    }
}

fn default_service_name() -> String {
    "geo-cdn-dns".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_ms() -> u64 {
    3000
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "ipapi".to_string(),
            url: "https://ipapi.co/{ip}/json/".to_string(),
        },
        ProviderConfig {
            name: "freegeoip".to_string(),
            url: "https://freegeoip.app/json/{ip}".to_string(),
        },
    ]
}

fn default_replica_hostnames() -> Vec<String> {
    [
        "cdn-http3.khoury.northeastern.edu",
        "cdn-http4.khoury.northeastern.edu",
        "cdn-http7.khoury.northeastern.edu",
        "cdn-http11.khoury.northeastern.edu",
        "cdn-http14.khoury.northeastern.edu",
        "cdn-http15.khoury.northeastern.edu",
        "cdn-http16.khoury.northeastern.edu",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// SOA (Start of Authority) record configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoaConfig {
    /// Primary nameserver hostname (e.g., "ns1.example.com").
    pub mname: String,

    /// Admin email in DNS format (e.g., "admin.example.com" for admin@example.com).
    pub rname: String,

    /// Serial number.
    #[serde(default = "default_serial")]
    pub serial: u32,

    /// Refresh interval in seconds.
    #[serde(default = "default_refresh")]
    pub refresh: u32,

    /// Retry interval in seconds.
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Expire time in seconds.
    #[serde(default = "default_expire")]
    pub expire: u32,

    /// Minimum TTL in seconds.
    #[serde(default = "default_minimum")]
    pub minimum: u32,
}

fn default_ttl() -> u32 {
    60
}

fn default_serial() -> u32 {
    1
}

fn default_refresh() -> u32 {
    3600
}

fn default_retry() -> u32 {
    600
}

fn default_expire() -> u32 {
    604800
}

fn default_minimum() -> u32 {
    60
}

impl Default for SoaConfig {
    fn default() -> Self {
        Self {
            mname: "ns1.example.com".to_string(),
            rname: "admin.example.com".to_string(),
            serial: default_serial(),
            refresh: default_refresh(),
            retry: default_retry(),
            expire: default_expire(),
            minimum: default_minimum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
            [dns]
            listen_addr = "127.0.0.1:5353"
            cdn_name = "cdn.example.com"
        "#
    }

    fn parse(toml: &str) -> Config {
        ::config::Config::builder()
            .add_source(::config::File::from_str(toml, ::config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config = parse(minimal_toml());

        assert_eq!(config.dns.ttl, 60);
        assert_eq!(config.geo.request_timeout_ms, 3000);
        assert_eq!(config.geo.providers.len(), 2);
        assert_eq!(config.geo.providers[0].name, "ipapi");
        assert_eq!(config.replicas.hostnames.len(), 7);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.telemetry.opentelemetry.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_opentelemetry_section() {
        let config = parse(
            r#"
            [dns]
            listen_addr = "127.0.0.1:5353"
            cdn_name = "cdn.example.com"

            [telemetry.opentelemetry]
            endpoint = "http://localhost:4317"
            "#,
        );

        let otel = config.telemetry.opentelemetry.unwrap();
        assert_eq!(otel.endpoint, "http://localhost:4317");
        assert_eq!(otel.service_name, "geo-cdn-dns");
    }

    #[test]
    fn test_provider_order_is_preserved() {
        let config = parse(
            r#"
            [dns]
            listen_addr = "127.0.0.1:5353"
            cdn_name = "cdn.example.com"

            [[geo.providers]]
            name = "second"
            url = "http://b/{ip}"

            [[geo.providers]]
            name = "first"
            url = "http://a/{ip}"
            "#,
        );

        let names: Vec<_> = config.geo.providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["second", "first"]);
    }

    #[test]
    fn test_validate_rejects_missing_placeholder() {
        let mut config = parse(minimal_toml());
        config.geo.providers = vec![ProviderConfig {
            name: "broken".to_string(),
            url: "http://geo.example.com/json".to_string(),
        }];

        assert!(matches!(config.validate(), Err(DnsError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_replicas() {
        let mut config = parse(minimal_toml());
        config.replicas.hostnames.clear();

        assert!(matches!(config.validate(), Err(DnsError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_soa_timer_out_of_range() {
        let mut config = parse(minimal_toml());
        config.dns.soa.expire = i32::MAX as u32 + 1;

        assert!(matches!(config.validate(), Err(DnsError::Config(_))));

        config.dns.soa.expire = i32::MAX as u32;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = parse(minimal_toml());
        config.geo.request_timeout_ms = 0;

        assert!(matches!(config.validate(), Err(DnsError::Config(_))));
    }
}
