//! geo-cdn-dns binary entry point.

use clap::Parser;
use geo_cdn_dns::{server, telemetry, Config, DnsServer};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Authoritative DNS server answering a CDN name with the closest replica.
#[derive(Parser, Debug)]
#[command(name = "geo-cdn-dns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, default_value = "geo-cdn-dns.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        listen_addr = %config.dns.listen_addr,
        cdn_name = %config.dns.cdn_name,
        replicas = config.replicas.hostnames.len(),
        providers = config.geo.providers.len(),
        "Starting geo-cdn-dns"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(server::cancel_on_signal(shutdown.clone()));

    let server = DnsServer::new(&config)?;
    let result = server.run(shutdown).await;

    telemetry::shutdown();

    if let Err(e) = result {
        error!("DNS server error: {}", e);
        return Err(e.into());
    }

    info!("geo-cdn-dns shutdown complete");
    Ok(())
}
