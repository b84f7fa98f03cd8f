//! Service initialization

use crate::auth::JwtValidator;
use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use stowage_core::{Config, ItemNotifier};
use stowage_db::Catalog;
use stowage_plugins::PluginRegistry;
use stowage_services::{BroadcastNotifier, ChunkSessionManager, IngestService, RetentionSweeper};
use stowage_storage::StorageLayout;
use stowage_worker::{WorkQueue, WorkerPool};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Services {
    pub state: Arc<AppState>,
    pub background: Vec<JoinHandle<()>>,
}

/// Build every service and start the background loops.
pub async fn initialize_services(
    config: &Config,
    catalog: Arc<dyn Catalog>,
    shutdown: CancellationToken,
) -> Result<Services> {
    let layout = StorageLayout::new(config.storage_root().clone())
        .await
        .context("Failed to prepare storage root")?;

    let plugins = setup_plugins(config).await?;

    let (queue, receiver) = WorkQueue::new();
    let notifier = BroadcastNotifier::default();
    let ingest = Arc::new(IngestService::new(
        catalog.clone(),
        layout.clone(),
        queue,
        plugins.clone(),
        Arc::new(notifier.clone()) as Arc<dyn ItemNotifier>,
    ));

    let sessions = Arc::new(ChunkSessionManager::new(
        ingest.clone(),
        config.max_chunk_count(),
        config.max_upload_size_bytes(),
    ));

    let mut background = Vec::new();

    let pool = WorkerPool::new(config.worker_concurrency());
    background.push(pool.spawn(receiver, shutdown.clone()));

    // Items stored before a restart whose enrichment never ran
    match ingest.requeue_missing_metadata().await {
        Ok(requeued) => tracing::info!(requeued, "Pending enrichment re-queued"),
        Err(e) => tracing::error!(error = %e, "Failed to re-queue pending enrichment"),
    }

    background.push(
        sessions
            .clone()
            .start_janitor(config.chunk_session_ttl(), shutdown.clone()),
    );

    let sweeper = Arc::new(RetentionSweeper::new(
        catalog.clone(),
        layout,
        sessions.clone(),
        config.group_grace(),
        config.chunk_session_ttl(),
        config.sweep_time_utc(),
    ));
    background.push(sweeper.start(shutdown));

    let state = Arc::new(AppState {
        config: config.clone(),
        catalog,
        ingest,
        sessions,
        plugins,
        notifier,
        jwt: JwtValidator::new(config.jwt_secret()),
    });

    tracing::info!(
        worker_concurrency = config.worker_concurrency(),
        "Services initialized"
    );

    Ok(Services { state, background })
}

async fn setup_plugins(config: &Config) -> Result<PluginRegistry> {
    let registry = PluginRegistry::new();

    #[cfg(feature = "plugin-image-preview")]
    registry
        .register(Arc::new(stowage_plugins::ImagePreviewPlugin::new()))
        .await;

    #[cfg(feature = "plugin-video-info")]
    match config.enrichment_api() {
        Some(api) => {
            let plugin = stowage_plugins::VideoInfoPlugin::new(stowage_plugins::VideoInfoConfig {
                base_url: api.base_url.clone(),
                api_key: api.api_key.clone(),
            })
            .context("Failed to initialize video-info plugin")?;
            registry.register(Arc::new(plugin)).await;
        }
        None => {
            tracing::info!("ENRICHMENT_API_URL not set, video-info plugin disabled");
        }
    }

    #[cfg(not(feature = "plugin-video-info"))]
    let _ = config;

    Ok(registry)
}
