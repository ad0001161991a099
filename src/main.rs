use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cellbrawl_server::config::ServerConfig;
use cellbrawl_server::metrics::{self, Metrics};
use cellbrawl_server::net::transport::WebTransportServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Cellbrawl Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: {}:{}, arena {}x{} @ {} Hz, fight @ {} Hz",
        config.bind_address,
        config.port,
        config.world_width,
        config.world_height,
        config.arena_tick_rate,
        config.fight_tick_rate
    );

    let metrics = Arc::new(Metrics::new());

    let metrics_clone = metrics.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let server = WebTransportServer::new(config.clone(), metrics.clone()).await?;

    info!("Server ready on https://{}:{}", config.bind_address, config.port);
    info!("Certificate hash: {}", server.cert_hash());
    info!(
        "Chrome flag: --ignore-certificate-errors-spki-list={}",
        server.cert_hash()
    );

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {:#}", e);
            }
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        }
    }

    info!("Server stopped");
    Ok(())
}
