use std::time::Duration;
use stowage_api::setup::{initialize_app, server::start_server};
use stowage_core::Config;
use tokio_util::sync::CancellationToken;

/// How long background loops get to drain after the server stops.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    stowage_api::telemetry::init_telemetry()?;

    let shutdown = CancellationToken::new();
    let app = initialize_app(config.clone(), shutdown.clone()).await?;

    start_server(&config, app.router, shutdown).await?;

    let drain = futures::future::join_all(app.background);
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("Background tasks did not stop in time");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
