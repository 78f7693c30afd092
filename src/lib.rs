//! geo-cdn-dns - An authoritative DNS server that sends each client to the
//! geographically closest CDN replica.
//!
//! A single CDN hostname is served. Every `A`/`AAAA` query for it is answered
//! with the address of the replica server nearest to the query's source
//! address, by great-circle distance between IP-geolocated coordinates.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          geo-cdn-dns                             │
//! │                                                                  │
//! │  UDP/TCP ──▶ CdnRequestHandler ──▶ Catalog ──▶ CdnAuthority      │
//! │               (SERVFAIL if none)       │ client ip               │
//! │                                        ▼                         │
//! │                                 ReplicaSelector                  │
//! │                   ┌───────────────┼────────────────┐             │
//! │                   ▼               ▼                ▼             │
//! │            HostnameCache  CoordinateResolver   selections        │
//! │            (system DNS)     │ provider 1 ──fail──▶ provider 2    │
//! │                             ▼                                    │
//! │                         haversine                                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All three caches are append-only and live as long as the selector.
//! Geolocation failures are never cached; a client with no locatable replica
//! gets `SERVFAIL` and is retried on the next query.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use geo_cdn_dns::{Config, DnsServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load("geo-cdn-dns.toml".as_ref()).unwrap();
//!     let shutdown = CancellationToken::new();
//!     tokio::spawn(geo_cdn_dns::server::cancel_on_signal(shutdown.clone()));
//!
//!     let server = DnsServer::new(&config).unwrap();
//!     server.run(shutdown).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod authority;
pub mod config;
pub mod error;
pub mod geo;
pub mod handler;
pub mod hostname;
pub mod metrics;
pub mod provider;
pub mod resolver;
pub mod selector;
pub mod server;
pub mod telemetry;

// Re-export main types
pub use authority::CdnAuthority;
pub use crate::config::{
    Config, DnsConfig, GeoConfig, OpenTelemetryConfig, ProviderConfig, ReplicaConfig, SoaConfig,
    TelemetryConfig,
};
pub use error::{DnsError, GeoError};
pub use geo::{distance, haversine, Coordinate};
pub use handler::CdnRequestHandler;
pub use resolver::CoordinateResolver;
pub use selector::{Replica, ReplicaSelector, Selection};
pub use server::DnsServer;
