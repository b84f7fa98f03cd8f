use crate::auth::JwtValidator;
use std::sync::Arc;
use stowage_core::Config;
use stowage_db::Catalog;
use stowage_plugins::PluginRegistry;
use stowage_services::{BroadcastNotifier, ChunkSessionManager, IngestService};

/// Shared handler state
pub struct AppState {
    pub config: Config,
    pub catalog: Arc<dyn Catalog>,
    pub ingest: Arc<IngestService>,
    pub sessions: Arc<ChunkSessionManager>,
    pub plugins: PluginRegistry,
    pub notifier: BroadcastNotifier,
    pub jwt: JwtValidator,
}
