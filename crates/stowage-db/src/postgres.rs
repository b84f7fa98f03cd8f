use crate::catalog::{Catalog, CatalogResult};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres};
use std::path::PathBuf;
use stowage_core::models::{ShareLink, UploadGroup, UploadItem};
use stowage_core::AppError;
use uuid::Uuid;

/// Apply the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .context("Failed to run database migrations")?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    group_id: Uuid,
    file_name: String,
    physical_path: String,
    size: i64,
    created_at: DateTime<Utc>,
    metadata: Option<serde_json::Value>,
}

impl From<ItemRow> for UploadItem {
    fn from(row: ItemRow) -> Self {
        UploadItem {
            id: row.id,
            group_id: row.group_id,
            file_name: row.file_name,
            physical_path: PathBuf::from(row.physical_path),
            size: row.size,
            created_at: row.created_at,
            metadata: row.metadata,
        }
    }
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    link_code: Option<String>,
    link_created_at: Option<DateTime<Utc>>,
    link_expires_at: Option<DateTime<Utc>>,
}

impl From<GroupRow> for UploadGroup {
    fn from(row: GroupRow) -> Self {
        let link = match (row.link_code, row.link_created_at, row.link_expires_at) {
            (Some(code), Some(created_at), Some(expires_at)) => Some(ShareLink {
                code,
                group_id: row.id,
                created_at,
                expires_at,
            }),
            _ => None,
        };
        UploadGroup {
            id: row.id,
            created_at: row.created_at,
            link,
        }
    }
}

const GROUP_SELECT: &str = r#"
    SELECT
        g.id,
        g.created_at,
        l.code AS link_code,
        l.created_at AS link_created_at,
        l.expires_at AS link_expires_at
    FROM upload_groups g
    LEFT JOIN share_links l ON l.group_id = g.id
"#;

const ITEM_COLUMNS: &str =
    "id, group_id, file_name, physical_path, size, created_at, metadata";

/// PostgreSQL-backed catalog
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    #[tracing::instrument(skip(self, group), fields(db.table = "upload_groups", db.operation = "insert", db.record_id = %group.id))]
    async fn create_group(&self, group: &UploadGroup) -> CatalogResult<()> {
        sqlx::query("INSERT INTO upload_groups (id, created_at) VALUES ($1, $2)")
            .bind(group.id)
            .bind(group.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "upload_groups", db.operation = "select", db.record_id = %group_id))]
    async fn get_group(&self, group_id: Uuid) -> CatalogResult<Option<UploadGroup>> {
        let query = format!("{} WHERE g.id = $1", GROUP_SELECT);
        let row = sqlx::query_as::<Postgres, GroupRow>(&query)
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(UploadGroup::from))
    }

    #[tracing::instrument(skip(self, link), fields(db.table = "share_links", db.operation = "upsert", db.record_id = %link.group_id))]
    async fn upsert_share_link(&self, link: &ShareLink) -> CatalogResult<()> {
        sqlx::query(
            r#"
            INSERT INTO share_links (code, group_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (group_id) DO UPDATE
            SET code = EXCLUDED.code,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&link.code)
        .bind(link.group_id)
        .bind(link.created_at)
        .bind(link.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, item), fields(db.table = "upload_items", db.operation = "insert", db.record_id = %item.id))]
    async fn create_item(&self, item: &UploadItem) -> CatalogResult<()> {
        let physical_path = item.physical_path.to_string_lossy().into_owned();
        sqlx::query(
            r#"
            INSERT INTO upload_items (id, group_id, file_name, physical_path, size, created_at, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.id)
        .bind(item.group_id)
        .bind(&item.file_name)
        .bind(physical_path)
        .bind(item.size)
        .bind(item.created_at)
        .bind(&item.metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, item), fields(db.table = "upload_items", db.operation = "update", db.record_id = %item.id))]
    async fn update_item(&self, item: &UploadItem) -> CatalogResult<()> {
        let result = sqlx::query("UPDATE upload_items SET metadata = $2 WHERE id = $1")
            .bind(item.id)
            .bind(&item.metadata)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Item {} not found", item.id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "upload_items", db.operation = "select", db.record_id = %item_id))]
    async fn get_item(&self, item_id: Uuid) -> CatalogResult<Option<UploadItem>> {
        let query = format!("SELECT {} FROM upload_items WHERE id = $1", ITEM_COLUMNS);
        let row = sqlx::query_as::<Postgres, ItemRow>(&query)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(UploadItem::from))
    }

    #[tracing::instrument(skip(self), fields(db.table = "upload_items", db.operation = "select", group_id = %group_id))]
    async fn list_group_items(&self, group_id: Uuid) -> CatalogResult<Vec<UploadItem>> {
        let query = format!(
            "SELECT {} FROM upload_items WHERE group_id = $1 ORDER BY created_at ASC",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<Postgres, ItemRow>(&query)
            .bind(group_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(UploadItem::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "upload_items", db.operation = "select"))]
    async fn get_items_missing_metadata(&self) -> CatalogResult<Vec<UploadItem>> {
        let query = format!(
            "SELECT {} FROM upload_items WHERE metadata IS NULL ORDER BY created_at ASC",
            ITEM_COLUMNS
        );
        let rows = sqlx::query_as::<Postgres, ItemRow>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(UploadItem::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "upload_groups", db.operation = "select"))]
    async fn get_groups_eligible_for_deletion(
        &self,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> CatalogResult<Vec<UploadGroup>> {
        let cutoff = now - grace;
        let query = format!(
            "{} WHERE g.created_at < $1 AND (l.code IS NULL OR l.expires_at < $1)",
            GROUP_SELECT
        );
        let rows = sqlx::query_as::<Postgres, GroupRow>(&query)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(UploadGroup::from).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "upload_groups", db.operation = "delete", db.record_id = %group_id))]
    async fn delete_group_cascade(&self, group_id: Uuid) -> CatalogResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM share_links WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        let items = sqlx::query("DELETE FROM upload_items WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        let groups = sqlx::query("DELETE FROM upload_groups WHERE id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            group_id = %group_id,
            items_deleted = items.rows_affected(),
            "Group deleted"
        );

        Ok(groups.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "upload_items", db.operation = "select"))]
    async fn list_all_items(&self) -> CatalogResult<Vec<UploadItem>> {
        let query = format!("SELECT {} FROM upload_items", ITEM_COLUMNS);
        let rows = sqlx::query_as::<Postgres, ItemRow>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(UploadItem::from).collect())
    }
}
