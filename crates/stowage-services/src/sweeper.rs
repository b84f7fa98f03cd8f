//! Daily retention sweep
//!
//! Reconciles the catalog with the storage root once a day at a fixed UTC
//! time. A missed run is skipped, not caught up. The sweep does not lock out
//! ingestion: a file written just before its catalog row can be removed if the
//! sweep lists it in between.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use stowage_core::AppError;
use stowage_db::Catalog;
use stowage_storage::{list_child_dirs, list_files, prune_empty_dirs, remove_dir_best_effort, StorageLayout};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::chunked::ChunkSessionManager;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub groups_deleted: usize,
    pub files_deleted: usize,
    pub dirs_removed: usize,
    pub stale_sessions_removed: usize,
}

pub struct RetentionSweeper {
    catalog: Arc<dyn Catalog>,
    layout: StorageLayout,
    sessions: Arc<ChunkSessionManager>,
    group_grace: Duration,
    session_ttl: Duration,
    sweep_time: NaiveTime,
}

impl RetentionSweeper {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        layout: StorageLayout,
        sessions: Arc<ChunkSessionManager>,
        group_grace: Duration,
        session_ttl: Duration,
        sweep_time: NaiveTime,
    ) -> Self {
        Self {
            catalog,
            layout,
            sessions,
            group_grace,
            session_ttl,
            sweep_time,
        }
    }

    /// Run the sweep daily at the configured time until `shutdown` fires.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let wait = duration_until_next(Utc::now(), self.sweep_time);
                tracing::debug!(next_run_in_secs = wait.as_secs(), "Retention sweep scheduled");

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }

                tracing::info!("Starting scheduled retention sweep");
                if let Err(e) = self.run_once(Utc::now()).await {
                    tracing::error!(error = %e, "Retention sweep failed");
                }
            }
            tracing::debug!("Retention sweeper stopped");
        })
    }

    /// One full sweep. Per-file and per-group failures are logged and skipped;
    /// a failure to read the catalog aborts the file passes.
    #[tracing::instrument(skip(self), fields(sweep.root = %self.layout.root().display()))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let start = Instant::now();
        let mut report = SweepReport {
            groups_deleted: self.collect_orphan_groups(now).await?,
            ..SweepReport::default()
        };

        if self.catalog.is_durable() {
            report.files_deleted = self.delete_orphan_files().await?;
        } else {
            tracing::warn!("Catalog is not durable; skipping orphan file deletion");
        }
        report.dirs_removed = prune_empty_dirs(self.layout.root(), &self.layout.reserved_dirs()).await?;
        report.stale_sessions_removed = self.remove_stale_session_dirs(now).await?;

        tracing::info!(
            groups_deleted = report.groups_deleted,
            files_deleted = report.files_deleted,
            dirs_removed = report.dirs_removed,
            stale_sessions_removed = report.stale_sessions_removed,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Retention sweep completed"
        );

        Ok(report)
    }

    async fn collect_orphan_groups(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let groups = self
            .catalog
            .get_groups_eligible_for_deletion(now, self.group_grace)
            .await?;

        let mut deleted = 0;
        for group in groups {
            match self.catalog.delete_group_cascade(group.id).await {
                Ok(true) => {
                    tracing::info!(
                        group_id = %group.id,
                        created_at = %group.created_at,
                        has_link = group.link.is_some(),
                        "Deleted orphan group"
                    );
                    deleted += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(error = %e, group_id = %group.id, "Failed to delete orphan group");
                    continue;
                }
            }

            if let Err(e) = self.layout.remove_group_dir(group.id).await {
                tracing::warn!(error = %e, group_id = %group.id, "Failed to remove group directory");
            }
        }

        Ok(deleted)
    }

    async fn delete_orphan_files(&self) -> Result<usize, AppError> {
        let valid: HashSet<String> = self
            .catalog
            .list_all_items()
            .await?
            .iter()
            .filter_map(|item| item.physical_file_name().map(str::to_owned))
            .collect();

        let files = list_files(self.layout.root(), &self.layout.reserved_dirs()).await?;

        let mut deleted = 0;
        for path in files {
            let referenced = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| valid.contains(name));
            if referenced {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "Deleted orphan file");
                    deleted += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "Failed to delete orphan file");
                }
            }
        }

        Ok(deleted)
    }

    /// Chunk directories with no live session, untouched for longer than the session TTL.
    async fn remove_stale_session_dirs(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let live = self.sessions.live_sessions().await;
        let cutoff: SystemTime = (now - self.session_ttl).into();

        let mut removed = 0;
        for (dir, modified) in list_child_dirs(&self.layout.temp_root()).await? {
            let is_live = dir
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| Uuid::parse_str(n).ok())
                .is_some_and(|id| live.contains(&id));
            if is_live || modified >= cutoff {
                continue;
            }

            if remove_dir_best_effort(&dir).await {
                tracing::info!(path = %dir.display(), "Removed abandoned chunk directory");
                removed += 1;
            }
        }

        Ok(removed)
    }
}

/// Time from `now` until the next occurrence of `at` (UTC), always in the future.
pub fn duration_until_next(now: DateTime<Utc>, at: NaiveTime) -> std::time::Duration {
    let mut next = now.date_naive().and_time(at).and_utc();
    if next <= now {
        next += Duration::days(1);
    }
    (next - now).to_std().unwrap_or(std::time::Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::test_support::{harness, Harness};
    use chrono::TimeZone;
    use async_trait::async_trait;
    use stowage_core::models::{ShareLink, UploadGroup, UploadItem};
    use stowage_db::{CatalogResult, InMemoryCatalog};
    use tempfile::tempdir;

    /// In-memory rows presented as a durable store.
    struct Persistent(Arc<InMemoryCatalog>);

    #[async_trait]
    impl Catalog for Persistent {
        async fn create_group(&self, group: &UploadGroup) -> CatalogResult<()> {
            self.0.create_group(group).await
        }

        async fn get_group(&self, group_id: Uuid) -> CatalogResult<Option<UploadGroup>> {
            self.0.get_group(group_id).await
        }

        async fn upsert_share_link(&self, link: &ShareLink) -> CatalogResult<()> {
            self.0.upsert_share_link(link).await
        }

        async fn create_item(&self, item: &UploadItem) -> CatalogResult<()> {
            self.0.create_item(item).await
        }

        async fn update_item(&self, item: &UploadItem) -> CatalogResult<()> {
            self.0.update_item(item).await
        }

        async fn get_item(&self, item_id: Uuid) -> CatalogResult<Option<UploadItem>> {
            self.0.get_item(item_id).await
        }

        async fn list_group_items(&self, group_id: Uuid) -> CatalogResult<Vec<UploadItem>> {
            self.0.list_group_items(group_id).await
        }

        async fn get_items_missing_metadata(&self) -> CatalogResult<Vec<UploadItem>> {
            self.0.get_items_missing_metadata().await
        }

        async fn get_groups_eligible_for_deletion(
            &self,
            now: DateTime<Utc>,
            grace: Duration,
        ) -> CatalogResult<Vec<UploadGroup>> {
            self.0.get_groups_eligible_for_deletion(now, grace).await
        }

        async fn delete_group_cascade(&self, group_id: Uuid) -> CatalogResult<bool> {
            self.0.delete_group_cascade(group_id).await
        }

        async fn list_all_items(&self) -> CatalogResult<Vec<UploadItem>> {
            self.0.list_all_items().await
        }
    }

    fn sweeper(h: &Harness) -> (RetentionSweeper, Arc<ChunkSessionManager>) {
        sweeper_over(h, Arc::new(Persistent(h.catalog.clone())))
    }

    fn sweeper_over(
        h: &Harness,
        catalog: Arc<dyn Catalog>,
    ) -> (RetentionSweeper, Arc<ChunkSessionManager>) {
        let sessions = Arc::new(ChunkSessionManager::new(h.ingest.clone(), 100, 1 << 30));
        let sweeper = RetentionSweeper::new(
            catalog,
            h.ingest.layout().clone(),
            sessions.clone(),
            Duration::hours(24),
            Duration::hours(24),
            NaiveTime::from_hms_opt(3, 0, 0).unwrap(),
        );
        (sweeper, sessions)
    }

    async fn group_created(h: &Harness, age: Duration) -> UploadGroup {
        let mut group = UploadGroup::new();
        group.created_at = Utc::now() - age;
        h.catalog.create_group(&group).await.unwrap();
        group
    }

    async fn stored_item(h: &Harness, group_id: Uuid, name: &str) -> UploadItem {
        let id = Uuid::new_v4();
        let path = h.ingest.layout().item_path(group_id, id, name);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"data").await.unwrap();
        let item = UploadItem::new(id, group_id, name, path, 4);
        h.catalog.create_item(&item).await.unwrap();
        item
    }

    #[test]
    fn test_duration_until_next() {
        let at = NaiveTime::from_hms_opt(3, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2024, 5, 1, 1, 30, 0).unwrap();
        assert_eq!(duration_until_next(before, at).as_secs(), 90 * 60);

        let after = Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap();
        assert_eq!(duration_until_next(after, at).as_secs(), 24 * 3600);
    }

    #[tokio::test]
    async fn test_old_linkless_group_is_deleted_and_recent_one_kept() {
        let dir = tempdir().unwrap();
        let h = harness(dir.path()).await;
        let (sweeper, _) = sweeper(&h);

        let old = group_created(&h, Duration::hours(25)).await;
        let recent = group_created(&h, Duration::hours(1)).await;
        let old_item = stored_item(&h, old.id, "old.txt").await;
        let recent_item = stored_item(&h, recent.id, "recent.txt").await;

        let report = sweeper.run_once(Utc::now()).await.unwrap();

        assert_eq!(report.groups_deleted, 1);
        assert!(h.catalog.get_group(old.id).await.unwrap().is_none());
        assert!(h.catalog.get_item(old_item.id).await.unwrap().is_none());
        assert!(!old_item.physical_path.exists());
        assert!(!h.ingest.layout().group_dir(old.id).exists());

        assert!(h.catalog.get_group(recent.id).await.unwrap().is_some());
        assert!(recent_item.physical_path.exists());
    }

    #[tokio::test]
    async fn test_group_with_live_link_is_kept() {
        let dir = tempdir().unwrap();
        let h = harness(dir.path()).await;
        let (sweeper, _) = sweeper(&h);

        let linked = group_created(&h, Duration::hours(48)).await;
        let now = Utc::now();
        h.catalog
            .upsert_share_link(&ShareLink {
                code: "abc123".to_string(),
                group_id: linked.id,
                created_at: now - Duration::hours(48),
                expires_at: now - Duration::hours(2),
            })
            .await
            .unwrap();

        let report = sweeper.run_once(now).await.unwrap();

        assert_eq!(report.groups_deleted, 0);
        assert!(h.catalog.get_group(linked.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_orphan_files_are_deleted_and_referenced_files_kept() {
        let dir = tempdir().unwrap();
        let h = harness(dir.path()).await;
        let (sweeper, _) = sweeper(&h);
        let layout = h.ingest.layout().clone();

        let kept = stored_item(&h, h.group_id, "keep.txt").await;
        let stray_dir = layout.root().join("stray").join("nested");
        tokio::fs::create_dir_all(&stray_dir).await.unwrap();
        tokio::fs::write(stray_dir.join("lost.bin"), b"x").await.unwrap();
        let unreferenced = layout.item_path(h.group_id, Uuid::new_v4(), "gone.txt");
        tokio::fs::write(&unreferenced, b"x").await.unwrap();
        let poster = layout.assets_dir().join("poster.png");
        tokio::fs::write(&poster, b"png").await.unwrap();

        let report = sweeper.run_once(Utc::now()).await.unwrap();

        assert_eq!(report.files_deleted, 2);
        assert!(kept.physical_path.exists());
        assert!(!unreferenced.exists());
        assert!(!layout.root().join("stray").exists());
        assert!(poster.exists());
        assert!(layout.temp_root().exists());
    }

    #[tokio::test]
    async fn test_stale_chunk_dirs_removed_unless_session_is_live() {
        let dir = tempdir().unwrap();
        let h = harness(dir.path()).await;
        let (sweeper, sessions) = sweeper(&h);
        let layout = h.ingest.layout().clone();

        let live_id = sessions
            .start_upload(crate::chunked::StartUpload {
                group_id: h.group_id,
                file_name: "a.bin".to_string(),
                total_size: 2,
                total_chunks: 2,
            })
            .await
            .unwrap();
        tokio::fs::create_dir_all(layout.session_dir(live_id)).await.unwrap();
        let abandoned = layout.session_dir(Uuid::new_v4());
        tokio::fs::create_dir_all(&abandoned).await.unwrap();
        tokio::fs::write(abandoned.join("chunk.0000"), b"x").await.unwrap();

        // Same day: nothing is old enough yet.
        let report = sweeper.run_once(Utc::now()).await.unwrap();
        assert_eq!(report.stale_sessions_removed, 0);

        let report = sweeper
            .run_once(Utc::now() + Duration::hours(25))
            .await
            .unwrap();
        assert_eq!(report.stale_sessions_removed, 1);
        assert!(!abandoned.exists());
        assert!(layout.session_dir(live_id).exists());
    }

    #[tokio::test]
    async fn test_files_survive_restart_with_in_memory_catalog() {
        let dir = tempdir().unwrap();
        let before = harness(dir.path()).await;
        let stored = stored_item(&before, before.group_id, "kept.txt").await;

        // Rows written before the restart are gone; the files are not.
        let after = harness(dir.path()).await;
        let (sweeper, _) = sweeper_over(&after, after.catalog.clone());

        let report = sweeper.run_once(Utc::now()).await.unwrap();

        assert_eq!(report.files_deleted, 0);
        assert!(stored.physical_path.exists());
    }
}
