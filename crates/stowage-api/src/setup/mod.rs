//! Application setup and initialization
//!
//! Builds the catalog, services and router, and starts the background loops
//! (worker pool, session janitor, retention sweeper) tied to one shutdown token.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use stowage_core::Config;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Fully wired application
pub struct Application {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    /// Background loops; they stop once the shutdown token is cancelled.
    pub background: Vec<JoinHandle<()>>,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config, shutdown: CancellationToken) -> Result<Application> {
    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    tracing::info!(
        environment = %config.environment(),
        storage_root = %config.storage_root().display(),
        "Configuration loaded and validated successfully"
    );

    let catalog = database::setup_catalog(&config).await?;

    let services = services::initialize_services(&config, catalog, shutdown).await?;

    let router = routes::setup_routes(&config, services.state.clone())?;

    Ok(Application {
        state: services.state,
        router,
        background: services.background,
    })
}
