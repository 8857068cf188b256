//! lanternd - IRC daemon entry point.

use lanternd::config::Config;
use lanternd::network::Gateway;
use lanternd::state::Hub;
use lanternd::supervisor::PingSupervisor;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "lanternd.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        server = %config.server.name,
        network = %config.server.network,
        version = lanternd::state::VERSION,
        "Starting lanternd"
    );

    let hub = Hub::new(config);
    let gateway = Gateway::bind(Arc::clone(&hub)).await?;
    let supervisor = PingSupervisor::new(Arc::clone(&hub)).spawn();

    // Ctrl-C behaves like an operator STOP.
    {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                hub.stop("Server shutting down");
            }
        });
    }

    gateway.run().await?;
    let _ = supervisor.await;
    info!("Server stopped");
    Ok(())
}
