//! DNS server setup and lifecycle management.

use hickory_server::ServerFuture;
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{Config, DnsConfig};
use crate::error::DnsError;
use crate::handler::CdnRequestHandler;
use crate::selector::ReplicaSelector;

/// Interval for emitting cache metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Idle timeout for TCP connections.
const TCP_TIMEOUT: Duration = Duration::from_secs(30);

/// Periodically emit cache metrics.
async fn metrics_loop(selector: ReplicaSelector, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                selector.emit_metrics();
                debug!(
                    hostnames = selector.hostnames_count(),
                    coordinates = selector.coordinates_count(),
                    selections = selector.selections_count(),
                    "emitted cache metrics"
                );
            }
            _ = shutdown.cancelled() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// DNS server answering the CDN name with the closest replica.
pub struct DnsServer {
    config: DnsConfig,
    selector: ReplicaSelector,
}

impl DnsServer {
    /// Create a new DNS server from the full configuration.
    pub fn new(config: &Config) -> Result<Self, DnsError> {
        let selector = ReplicaSelector::from_config(config)?;
        Ok(Self::with_selector(config.dns.clone(), selector))
    }

    /// Create a DNS server around an existing selector.
    pub fn with_selector(config: DnsConfig, selector: ReplicaSelector) -> Self {
        Self { config, selector }
    }

    /// Get a reference to the replica selector.
    pub fn selector(&self) -> &ReplicaSelector {
        &self.selector
    }

    /// Run the DNS server until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), DnsError> {
        info!(
            listen_addr = %self.config.listen_addr,
            cdn_name = %self.config.cdn_name,
            replicas = self.selector.hostnames().len(),
            "Starting geo-cdn-dns server"
        );

        let handler = CdnRequestHandler::new(self.config.clone(), self.selector.clone())?;
        let mut server = ServerFuture::new(handler);

        // Bind UDP
        let udp_socket = UdpSocket::bind(self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, "DNS UDP listening");
        server.register_socket(udp_socket);

        // Bind TCP
        let tcp_listener = TcpListener::bind(self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, "DNS TCP listening");
        server.register_listener(tcp_listener, TCP_TIMEOUT);

        info!(cdn_name = %self.config.cdn_name, "DNS server ready to serve queries");

        let metrics_handle = tokio::spawn(metrics_loop(self.selector.clone(), shutdown.clone()));

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
            }
        }

        shutdown.cancel();
        let _ = metrics_handle.await;

        info!("DNS server stopped");
        Ok(())
    }
}

/// Wait for Ctrl-C or SIGTERM, then cancel `shutdown`.
pub async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating shutdown"),
        _ = shutdown.cancelled() => return,
    }

    shutdown.cancel();
}
