//! Shared tail of both ingest paths
//!
//! Once an upload's bytes are durably on disk the item is written to the
//! catalog, announced to the notifier and, when a plugin claims its extension,
//! queued for enrichment.

use futures::Stream;
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use stowage_core::constants::MAX_FILENAME_LENGTH;
use stowage_core::models::{UploadGroup, UploadItem};
use stowage_core::{AppError, ItemEvent, ItemNotifier};
use stowage_db::Catalog;
use stowage_plugins::{FilePlugin, PluginContext, PluginRegistry};
use stowage_storage::StorageLayout;
use stowage_worker::{WorkItem, WorkQueue};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::streaming::write_stream_to_file;

pub struct IngestService {
    catalog: Arc<dyn Catalog>,
    layout: StorageLayout,
    queue: WorkQueue,
    plugins: PluginRegistry,
    notifier: Arc<dyn ItemNotifier>,
}

impl IngestService {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        layout: StorageLayout,
        queue: WorkQueue,
        plugins: PluginRegistry,
        notifier: Arc<dyn ItemNotifier>,
    ) -> Self {
        Self {
            catalog,
            layout,
            queue,
            plugins,
            notifier,
        }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Load a group or fail with `NotFound`.
    pub async fn require_group(&self, group_id: Uuid) -> Result<UploadGroup, AppError> {
        self.catalog
            .get_group(group_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group {} not found", group_id)))
    }

    /// Stream a single-shot upload to its final location and register it.
    #[tracing::instrument(skip(self, stream), fields(group_id = %group_id, file_name = %file_name))]
    pub async fn store_stream<S, E>(
        &self,
        group_id: Uuid,
        file_name: &str,
        stream: S,
        max_bytes: Option<u64>,
    ) -> Result<UploadItem, AppError>
    where
        S: Stream<Item = Result<bytes::Bytes, E>>,
        E: Display,
    {
        validate_file_name(file_name)?;

        let item_id = Uuid::new_v4();
        let dest = self.layout.item_path(group_id, item_id, file_name);
        self.layout.ensure_parent_dir(&dest).await?;

        let size = write_stream_to_file(stream, &dest, max_bytes).await?;
        if size == 0 {
            discard_file(&dest).await;
            return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
        }

        let item = UploadItem::new(item_id, group_id, file_name, dest.clone(), size as i64);
        match self.register_item(item).await {
            Ok(item) => Ok(item),
            Err(e) => {
                discard_file(&dest).await;
                Err(e)
            }
        }
    }

    /// Create the catalog row, notify, and queue enrichment.
    ///
    /// Fails only if the catalog write fails; a closed queue is logged and the
    /// item is picked up again by the next start-up reconciliation.
    #[tracing::instrument(skip(self, item), fields(item_id = %item.id, group_id = %item.group_id))]
    pub async fn register_item(&self, item: UploadItem) -> Result<UploadItem, AppError> {
        self.catalog.create_item(&item).await?;

        tracing::info!(
            file_name = %item.file_name,
            size = item.size,
            path = %item.physical_path.display(),
            "Item registered"
        );

        self.notifier
            .notify(ItemEvent::created(item.group_id, item.id))
            .await;
        self.schedule_enrichment(&item).await;

        Ok(item)
    }

    /// Queue enrichment for `item` if a plugin claims its extension.
    ///
    /// Returns whether a work item was queued.
    pub async fn schedule_enrichment(&self, item: &UploadItem) -> bool {
        let Some(plugin) = self.plugins.for_file(&item.file_name).await else {
            tracing::debug!(item_id = %item.id, file_name = %item.file_name, "No plugin for item, skipping enrichment");
            return false;
        };

        let label = format!("{}:{}", plugin.name(), item.id);
        let job = EnrichmentJob {
            catalog: self.catalog.clone(),
            notifier: self.notifier.clone(),
            plugin,
            item_id: item.id,
            assets_dir: self.layout.assets_dir(),
        };

        match self
            .queue
            .submit(WorkItem::new(label, move |cancel| job.run(cancel)))
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, item_id = %item.id, "Failed to queue enrichment");
                false
            }
        }
    }

    /// Queue enrichment for every catalog item still lacking metadata.
    ///
    /// Run at start-up; this is how failed or interrupted enrichments are retried.
    #[tracing::instrument(skip(self))]
    pub async fn requeue_missing_metadata(&self) -> Result<usize, AppError> {
        let items = self.catalog.get_items_missing_metadata().await?;
        let pending = items.len();

        let mut queued = 0;
        for item in &items {
            if self.schedule_enrichment(item).await {
                queued += 1;
            }
        }

        tracing::info!(pending, queued, "Start-up enrichment reconciliation done");
        Ok(queued)
    }
}

struct EnrichmentJob {
    catalog: Arc<dyn Catalog>,
    notifier: Arc<dyn ItemNotifier>,
    plugin: Arc<dyn FilePlugin>,
    item_id: Uuid,
    assets_dir: PathBuf,
}

impl EnrichmentJob {
    async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        // Re-read so a group deleted in the meantime is not resurrected.
        let Some(mut item) = self.catalog.get_item(self.item_id).await? else {
            tracing::debug!(item_id = %self.item_id, "Item gone before enrichment");
            return Ok(());
        };
        if item.has_metadata() {
            return Ok(());
        }

        let ctx = PluginContext {
            assets_dir: self.assets_dir,
            cancel,
        };
        self.plugin.process(&mut item, &ctx).await?;

        if !item.has_metadata() {
            tracing::warn!(plugin = self.plugin.name(), item_id = %item.id, "Plugin produced no metadata");
            return Ok(());
        }

        self.catalog.update_item(&item).await?;
        self.notifier
            .notify(ItemEvent::updated(item.group_id, item.id))
            .await;

        tracing::info!(plugin = self.plugin.name(), item_id = %item.id, "Item enriched");
        Ok(())
    }
}

pub(crate) fn validate_file_name(file_name: &str) -> Result<(), AppError> {
    if file_name.trim().is_empty() {
        return Err(AppError::InvalidInput("File name must not be empty".to_string()));
    }
    if file_name.len() > MAX_FILENAME_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "File name exceeds {} characters",
            MAX_FILENAME_LENGTH
        )));
    }
    Ok(())
}

async fn discard_file(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(error = %e, path = %path.display(), "Failed to remove stored file");
    }
}
