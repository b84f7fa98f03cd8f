use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use utoipa::ToSchema;
use uuid::Uuid;

/// Catalog record for one uploaded file.
///
/// Created by an ingest path once the bytes are durably on disk. The only
/// mutation afterwards is the enrichment worker attaching `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadItem {
    pub id: Uuid,
    pub group_id: Uuid,
    /// Display file name as supplied by the client.
    pub file_name: String,
    /// Absolute path of the stored file.
    pub physical_path: PathBuf,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    /// Opaque enrichment result; `None` until a plugin has processed the item.
    pub metadata: Option<serde_json::Value>,
}

impl UploadItem {
    pub fn new(
        id: Uuid,
        group_id: Uuid,
        file_name: impl Into<String>,
        physical_path: impl Into<PathBuf>,
        size: i64,
    ) -> Self {
        Self {
            id,
            group_id,
            file_name: file_name.into(),
            physical_path: physical_path.into(),
            size,
            created_at: Utc::now(),
            metadata: None,
        }
    }

    /// Lowercase extension of the display name, without the dot.
    pub fn extension(&self) -> Option<String> {
        file_extension(&self.file_name)
    }

    /// Base name of the physical file (`<itemId><ext>`), used by the retention sweep.
    pub fn physical_file_name(&self) -> Option<&str> {
        self.physical_path.file_name().and_then(|n| n.to_str())
    }

    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }
}

/// Lowercase extension of a file name, without the dot.
pub fn file_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
}

/// Item as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadItemResponse {
    pub id: Uuid,
    pub group_id: Uuid,
    pub file_name: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

impl From<UploadItem> for UploadItemResponse {
    fn from(item: UploadItem) -> Self {
        Self {
            id: item.id,
            group_id: item.group_id,
            file_name: item.file_name,
            size: item.size,
            created_at: item.created_at,
            metadata: item.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(file_extension("Movie.MKV"), Some("mkv".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".hidden"), None);
    }

    #[test]
    fn physical_file_name_is_base_name() {
        let id = Uuid::new_v4();
        let group = Uuid::new_v4();
        let item = UploadItem::new(
            id,
            group,
            "holiday.jpg",
            format!("/srv/uploads/{}/{}.jpg", group, id),
            42,
        );
        assert_eq!(
            item.physical_file_name(),
            Some(format!("{}.jpg", id).as_str())
        );
        assert!(!item.has_metadata());
    }
}
