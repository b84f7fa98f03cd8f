use crate::catalog::{Catalog, CatalogResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use stowage_core::models::{ShareLink, UploadGroup, UploadItem};
use stowage_core::AppError;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    groups: HashMap<Uuid, UploadGroup>,
    items: HashMap<Uuid, UploadItem>,
}

/// Process-local catalog
///
/// Holds the same relations as the PostgreSQL schema, including the
/// group-to-item cascade. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryCatalog {
    state: RwLock<State>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_creation(mut items: Vec<UploadItem>) -> Vec<UploadItem> {
    items.sort_by_key(|i| i.created_at);
    items
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    fn is_durable(&self) -> bool {
        false
    }

    async fn create_group(&self, group: &UploadGroup) -> CatalogResult<()> {
        let mut state = self.state.write().await;
        if state.groups.contains_key(&group.id) {
            return Err(AppError::BadRequest(format!(
                "Upload group {} already exists",
                group.id
            )));
        }
        state.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn get_group(&self, group_id: Uuid) -> CatalogResult<Option<UploadGroup>> {
        Ok(self.state.read().await.groups.get(&group_id).cloned())
    }

    async fn upsert_share_link(&self, link: &ShareLink) -> CatalogResult<()> {
        let mut state = self.state.write().await;
        let group = state
            .groups
            .get_mut(&link.group_id)
            .ok_or_else(|| AppError::NotFound(format!("Upload group {} not found", link.group_id)))?;
        group.link = Some(link.clone());
        Ok(())
    }

    async fn create_item(&self, item: &UploadItem) -> CatalogResult<()> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(&item.group_id) {
            return Err(AppError::NotFound(format!(
                "Upload group {} not found",
                item.group_id
            )));
        }
        if state.items.contains_key(&item.id) {
            return Err(AppError::BadRequest(format!("Item {} already exists", item.id)));
        }
        state.items.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_item(&self, item: &UploadItem) -> CatalogResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .items
            .get_mut(&item.id)
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item.id)))?;
        stored.metadata = item.metadata.clone();
        Ok(())
    }

    async fn get_item(&self, item_id: Uuid) -> CatalogResult<Option<UploadItem>> {
        Ok(self.state.read().await.items.get(&item_id).cloned())
    }

    async fn list_group_items(&self, group_id: Uuid) -> CatalogResult<Vec<UploadItem>> {
        let state = self.state.read().await;
        let items = state
            .items
            .values()
            .filter(|i| i.group_id == group_id)
            .cloned()
            .collect();
        Ok(sorted_by_creation(items))
    }

    async fn get_items_missing_metadata(&self) -> CatalogResult<Vec<UploadItem>> {
        let state = self.state.read().await;
        let items = state
            .items
            .values()
            .filter(|i| i.metadata.is_none())
            .cloned()
            .collect();
        Ok(sorted_by_creation(items))
    }

    async fn get_groups_eligible_for_deletion(
        &self,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> CatalogResult<Vec<UploadGroup>> {
        let state = self.state.read().await;
        Ok(state
            .groups
            .values()
            .filter(|g| g.is_eligible_for_deletion(now, grace))
            .cloned()
            .collect())
    }

    async fn delete_group_cascade(&self, group_id: Uuid) -> CatalogResult<bool> {
        let mut state = self.state.write().await;
        if state.groups.remove(&group_id).is_none() {
            return Ok(false);
        }
        state.items.retain(|_, item| item.group_id != group_id);
        Ok(true)
    }

    async fn list_all_items(&self) -> CatalogResult<Vec<UploadItem>> {
        Ok(self.state.read().await.items.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_in(group_id: Uuid, name: &str) -> UploadItem {
        let id = Uuid::new_v4();
        UploadItem::new(id, group_id, name, format!("/data/{}/{}", group_id, id), 10)
    }

    #[test]
    fn test_in_memory_catalog_is_not_durable() {
        assert!(!InMemoryCatalog::new().is_durable());
    }

    #[tokio::test]
    async fn test_create_item_requires_group() {
        let catalog = InMemoryCatalog::new();
        let result = catalog.create_item(&item_in(Uuid::new_v4(), "a.txt")).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_item_sets_metadata() {
        let catalog = InMemoryCatalog::new();
        let group = UploadGroup::new();
        catalog.create_group(&group).await.unwrap();

        let mut item = item_in(group.id, "a.png");
        catalog.create_item(&item).await.unwrap();
        assert_eq!(catalog.get_items_missing_metadata().await.unwrap().len(), 1);

        item.metadata = Some(serde_json::json!({"width": 10}));
        catalog.update_item(&item).await.unwrap();

        let stored = catalog.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata, item.metadata);
        assert!(catalog.get_items_missing_metadata().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_group_cascades_to_items() {
        let catalog = InMemoryCatalog::new();
        let keep = UploadGroup::new();
        let doomed = UploadGroup::new();
        catalog.create_group(&keep).await.unwrap();
        catalog.create_group(&doomed).await.unwrap();
        catalog.create_item(&item_in(keep.id, "a")).await.unwrap();
        catalog.create_item(&item_in(doomed.id, "b")).await.unwrap();
        catalog.create_item(&item_in(doomed.id, "c")).await.unwrap();

        assert!(catalog.delete_group_cascade(doomed.id).await.unwrap());
        assert!(!catalog.delete_group_cascade(doomed.id).await.unwrap());

        let remaining = catalog.list_all_items().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].group_id, keep.id);
        assert!(catalog.get_group(doomed.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eligible_groups_respect_grace() {
        let catalog = InMemoryCatalog::new();
        let now = Utc::now();

        let mut old = UploadGroup::new();
        old.created_at = now - Duration::hours(25);
        let mut fresh = UploadGroup::new();
        fresh.created_at = now - Duration::hours(1);
        catalog.create_group(&old).await.unwrap();
        catalog.create_group(&fresh).await.unwrap();

        let eligible = catalog
            .get_groups_eligible_for_deletion(now, Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, old.id);

        catalog
            .upsert_share_link(&ShareLink {
                code: "live".to_string(),
                group_id: old.id,
                created_at: now,
                expires_at: now + Duration::hours(24),
            })
            .await
            .unwrap();
        let eligible = catalog
            .get_groups_eligible_for_deletion(now, Duration::hours(24))
            .await
            .unwrap();
        assert!(eligible.is_empty());
    }
}
