//! Geolocation providers.
//!
//! A provider turns an IP address into a [`Coordinate`] or fails. Providers are
//! unreliable by nature (rate limits, outages), so the coordinate resolver
//! tries them in order and only the first success matters.

use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{GeoConfig, ProviderConfig, IP_PLACEHOLDER};
use crate::error::{DnsError, GeoError};
use crate::geo::Coordinate;

/// Something that can locate an IP address.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    /// Look up the coordinate of `ip`.
    async fn locate(&self, ip: IpAddr) -> Result<Coordinate, GeoError>;
}

/// Fields we need from a provider's JSON body. Everything else is ignored.
#[derive(Debug, Deserialize)]
struct LocationBody {
    latitude: f64,
    longitude: f64,
}

/// Provider reached by `GET <url with {ip} substituted>`, answering JSON with
/// numeric `latitude` and `longitude` fields.
#[derive(Debug, Clone)]
pub struct HttpGeoProvider {
    name: String,
    url_template: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpGeoProvider {
    /// Create a provider sharing `client`. `timeout` bounds the whole request.
    pub fn new(config: &ProviderConfig, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            name: config.name.clone(),
            url_template: config.url.clone(),
            timeout,
            client,
        }
    }

    /// The request URL for `ip`.
    pub fn url_for(&self, ip: IpAddr) -> String {
        self.url_template.replace(IP_PLACEHOLDER, &ip.to_string())
    }
}

#[async_trait]
impl GeoProvider for HttpGeoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn locate(&self, ip: IpAddr) -> Result<Coordinate, GeoError> {
        let url = self.url_for(ip);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        let location: LocationBody =
            serde_json::from_slice(&body).map_err(|e| GeoError::Body(e.to_string()))?;

        if !location.latitude.is_finite() || !location.longitude.is_finite() {
            return Err(GeoError::Body("non-finite coordinate".to_string()));
        }

        Ok(Coordinate::new(location.latitude, location.longitude))
    }
}

impl HttpGeoProvider {
    fn classify(&self, err: reqwest::Error) -> GeoError {
        if err.is_timeout() {
            GeoError::Timeout(self.timeout)
        } else {
            GeoError::Http(err)
        }
    }
}

/// Build the configured providers, in order, sharing one HTTP client.
pub fn build_providers(config: &GeoConfig) -> Result<Vec<Arc<dyn GeoProvider>>, DnsError> {
    let timeout = config.request_timeout();
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("geo-cdn-dns/", env!("CARGO_PKG_VERSION")))
        .build()?;

    Ok(config
        .providers
        .iter()
        .map(|p| Arc::new(HttpGeoProvider::new(p, client.clone(), timeout)) as Arc<dyn GeoProvider>)
        .collect())
}
