use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use stowage_core::models::{ShareLink, UploadGroup, UploadItem};
use stowage_core::AppError;
use uuid::Uuid;

pub type CatalogResult<T> = Result<T, AppError>;

/// Item catalog
///
/// Groups own items; deleting a group removes its link and item rows.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn create_group(&self, group: &UploadGroup) -> CatalogResult<()>;

    /// Group with its share link, if any.
    async fn get_group(&self, group_id: Uuid) -> CatalogResult<Option<UploadGroup>>;

    /// Create the group's share link or replace the existing one.
    async fn upsert_share_link(&self, link: &ShareLink) -> CatalogResult<()>;

    async fn create_item(&self, item: &UploadItem) -> CatalogResult<()>;

    /// Persist the item's enrichment metadata.
    async fn update_item(&self, item: &UploadItem) -> CatalogResult<()>;

    async fn get_item(&self, item_id: Uuid) -> CatalogResult<Option<UploadItem>>;

    /// Items of a group, oldest first.
    async fn list_group_items(&self, group_id: Uuid) -> CatalogResult<Vec<UploadItem>>;

    async fn get_items_missing_metadata(&self) -> CatalogResult<Vec<UploadItem>>;

    /// Groups older than `grace` with no link, or with a link expired more than
    /// `grace` before `now`.
    async fn get_groups_eligible_for_deletion(
        &self,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> CatalogResult<Vec<UploadGroup>>;

    /// Delete link, items and group atomically. Returns false when the group did not exist.
    async fn delete_group_cascade(&self, group_id: Uuid) -> CatalogResult<bool>;

    async fn list_all_items(&self) -> CatalogResult<Vec<UploadItem>>;

    /// Whether rows survive a restart. A non-durable catalog cannot vouch for
    /// files written by an earlier process.
    fn is_durable(&self) -> bool {
        true
    }
}
