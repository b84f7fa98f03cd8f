//! Catalog setup

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use stowage_core::Config;
use stowage_db::{run_migrations, Catalog, InMemoryCatalog, PgCatalog};

/// PostgreSQL catalog when `DATABASE_URL` is set, otherwise the in-memory one.
pub async fn setup_catalog(config: &Config) -> Result<Arc<dyn Catalog>> {
    let Some(database_url) = config.database_url() else {
        tracing::warn!("DATABASE_URL not set, using in-memory catalog; records are lost on restart");
        return Ok(Arc::new(InMemoryCatalog::new()));
    };

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database connected successfully"
    );

    run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Arc::new(PgCatalog::new(pool)))
}
