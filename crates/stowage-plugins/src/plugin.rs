//! Plugin system core
//!
//! A plugin handles a fixed set of file extensions. `process` runs on a worker,
//! receives the catalog item and writes its result into `item.metadata`; the
//! caller persists the item afterwards.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Debug;
use std::path::PathBuf;
use stowage_core::models::UploadItem;
use tokio_util::sync::CancellationToken;

/// Context provided to plugins during execution
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Directory for side-assets such as posters (`<root>/assets`)
    pub assets_dir: PathBuf,
    /// Worker pool shutdown signal
    pub cancel: CancellationToken,
}

impl PluginContext {
    /// Path of a side-asset inside the assets directory.
    pub fn asset_path(&self, file_name: &str) -> PathBuf {
        self.assets_dir.join(file_name)
    }
}

/// Trait that all enrichment plugins must implement
#[async_trait]
pub trait FilePlugin: Send + Sync + Debug {
    /// Plugin name/identifier
    fn name(&self) -> &str;

    /// Lowercase extensions (without the dot) this plugin claims
    fn file_extensions(&self) -> &[&'static str];

    /// Enrich `item`, setting `item.metadata` on success.
    async fn process(&self, item: &mut UploadItem, ctx: &PluginContext) -> Result<()>;
}

/// Plugin information for listing available plugins
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub file_extensions: Vec<String>,
}

/// Content-addressed asset name: hex SHA-256 of `key` plus extension.
pub fn poster_file_name(key: &str, extension: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{}.{}", hex::encode(digest), extension)
}
