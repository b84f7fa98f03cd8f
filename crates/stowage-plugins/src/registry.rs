//! Plugin registry keyed by file extension

use std::collections::HashMap;
use std::sync::Arc;
use stowage_core::models::file_extension;
use tokio::sync::RwLock;

use crate::plugin::{FilePlugin, PluginInfo};

/// Registry resolving file extensions to plugins.
///
/// The first registered plugin claiming an extension keeps it.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    by_extension: Arc<RwLock<HashMap<String, Arc<dyn FilePlugin>>>>,
    plugin_info: Arc<RwLock<Vec<PluginInfo>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, plugin: Arc<dyn FilePlugin>) {
        let mut by_extension = self.by_extension.write().await;
        let mut plugin_info = self.plugin_info.write().await;

        let mut claimed = Vec::new();
        for ext in plugin.file_extensions() {
            let ext = ext.to_lowercase();
            if by_extension.contains_key(&ext) {
                tracing::warn!(
                    plugin = plugin.name(),
                    extension = %ext,
                    "Extension already claimed by another plugin"
                );
                continue;
            }
            by_extension.insert(ext.clone(), plugin.clone());
            claimed.push(ext);
        }

        tracing::info!(plugin = plugin.name(), extensions = ?claimed, "Plugin registered");

        plugin_info.push(PluginInfo {
            name: plugin.name().to_string(),
            file_extensions: claimed,
        });
    }

    pub async fn for_extension(&self, extension: &str) -> Option<Arc<dyn FilePlugin>> {
        self.by_extension
            .read()
            .await
            .get(&extension.to_lowercase())
            .cloned()
    }

    /// Plugin claiming the extension of `file_name`, if any.
    pub async fn for_file(&self, file_name: &str) -> Option<Arc<dyn FilePlugin>> {
        let extension = file_extension(file_name)?;
        self.for_extension(&extension).await
    }

    pub async fn list(&self) -> Vec<PluginInfo> {
        self.plugin_info.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginContext;
    use anyhow::Result;
    use async_trait::async_trait;
    use stowage_core::models::UploadItem;

    #[derive(Debug)]
    struct MockPlugin {
        name: &'static str,
        extensions: &'static [&'static str],
    }

    #[async_trait]
    impl FilePlugin for MockPlugin {
        fn name(&self) -> &str {
            self.name
        }

        fn file_extensions(&self) -> &[&'static str] {
            self.extensions
        }

        async fn process(&self, item: &mut UploadItem, _ctx: &PluginContext) -> Result<()> {
            item.metadata = Some(serde_json::json!({ "plugin": self.name }));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_new_registry_is_empty() {
        let registry = PluginRegistry::new();
        assert!(registry.list().await.is_empty());
        assert!(registry.for_file("movie.mkv").await.is_none());
    }

    #[tokio::test]
    async fn test_resolves_by_lowercase_extension() {
        let registry = PluginRegistry::new();
        registry
            .register(Arc::new(MockPlugin {
                name: "video",
                extensions: &["mkv", "mp4"],
            }))
            .await;

        assert_eq!(registry.for_file("Movie.MKV").await.unwrap().name(), "video");
        assert_eq!(registry.for_extension("mp4").await.unwrap().name(), "video");
        assert!(registry.for_file("notes.txt").await.is_none());
        assert!(registry.for_file("no_extension").await.is_none());
    }

    #[tokio::test]
    async fn test_first_registered_plugin_wins() {
        let registry = PluginRegistry::new();
        registry
            .register(Arc::new(MockPlugin {
                name: "first",
                extensions: &["png"],
            }))
            .await;
        registry
            .register(Arc::new(MockPlugin {
                name: "second",
                extensions: &["png", "gif"],
            }))
            .await;

        assert_eq!(registry.for_extension("png").await.unwrap().name(), "first");
        assert_eq!(registry.for_extension("gif").await.unwrap().name(), "second");

        let info = registry.list().await;
        assert_eq!(info.len(), 2);
        assert_eq!(info[1].file_extensions, vec!["gif".to_string()]);
    }

    #[tokio::test]
    async fn test_clone_shares_registrations() {
        let registry = PluginRegistry::new();
        let cloned = registry.clone();
        registry
            .register(Arc::new(MockPlugin {
                name: "images",
                extensions: &["jpg"],
            }))
            .await;
        assert!(cloned.for_extension("jpg").await.is_some());
    }
}
