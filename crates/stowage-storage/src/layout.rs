use crate::error::{StorageError, StorageResult};
use std::path::{Path, PathBuf};
use stowage_core::constants::{ASSETS_DIR_NAME, CHUNK_INDEX_WIDTH, TEMP_DIR_NAME};
use tokio::fs;
use uuid::Uuid;

/// Path scheme of the shared storage root
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    /// Create the storage root and its reserved directories.
    ///
    /// The root is canonicalized so that physical paths recorded in the catalog
    /// are absolute.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        let root = fs::canonicalize(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to canonicalize storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        let layout = StorageLayout { root };
        fs::create_dir_all(layout.temp_root()).await?;
        fs::create_dir_all(layout.assets_dir()).await?;

        tracing::debug!(root = %layout.root.display(), "Storage layout ready");

        Ok(layout)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn group_dir(&self, group_id: Uuid) -> PathBuf {
        self.root.join(group_id.to_string())
    }

    /// Final location of an item: `<root>/<groupId>/<itemId><ext>`.
    ///
    /// The extension is taken from the display name and kept only when it is
    /// plain alphanumeric.
    pub fn item_path(&self, group_id: Uuid, item_id: Uuid, file_name: &str) -> PathBuf {
        let file = match safe_extension(file_name) {
            Some(ext) => format!("{}.{}", item_id, ext),
            None => item_id.to_string(),
        };
        self.group_dir(group_id).join(file)
    }

    pub fn temp_root(&self) -> PathBuf {
        self.root.join(TEMP_DIR_NAME)
    }

    /// Per-session chunk directory: `<root>/temp/<itemId>`.
    pub fn session_dir(&self, item_id: Uuid) -> PathBuf {
        self.temp_root().join(item_id.to_string())
    }

    pub fn chunk_path(&self, item_id: Uuid, chunk_number: u32) -> PathBuf {
        self.session_dir(item_id)
            .join(chunk_file_name(chunk_number))
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(ASSETS_DIR_NAME)
    }

    /// Directories the orphan-file pass must not descend into.
    pub fn reserved_dirs(&self) -> Vec<PathBuf> {
        vec![self.temp_root(), self.assets_dir()]
    }

    /// Ensure parent directory exists
    pub async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if path.strip_prefix(&self.root).is_err() {
            return Err(StorageError::InvalidPath(format!(
                "{} is outside the storage root",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Remove a group's directory with everything in it. Missing directories are fine.
    pub async fn remove_group_dir(&self, group_id: Uuid) -> StorageResult<()> {
        let dir = self.group_dir(group_id);
        let start = std::time::Instant::now();

        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::info!(
                    path = %dir.display(),
                    group_id = %group_id,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Group directory removed"
                );
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to remove {}: {}",
                dir.display(),
                e
            ))),
        }
    }
}

/// Zero-padded chunk file name (`chunk.0000`).
pub fn chunk_file_name(chunk_number: u32) -> String {
    format!("chunk.{:0width$}", chunk_number, width = CHUNK_INDEX_WIDTH)
}

fn safe_extension(file_name: &str) -> Option<String> {
    let base = Path::new(file_name).file_name()?;
    let ext = Path::new(base).extension()?.to_str()?;
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_layout_creates_reserved_dirs() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("uploads")).await.unwrap();

        assert!(layout.root().is_absolute());
        assert!(layout.temp_root().is_dir());
        assert!(layout.assets_dir().is_dir());
        assert_eq!(layout.reserved_dirs().len(), 2);
    }

    #[tokio::test]
    async fn test_item_path_keeps_original_extension() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path()).await.unwrap();
        let group = Uuid::new_v4();
        let item = Uuid::new_v4();

        let path = layout.item_path(group, item, "Holiday Movie.MKV");
        assert_eq!(path, layout.group_dir(group).join(format!("{}.MKV", item)));

        let path = layout.item_path(group, item, "no-extension");
        assert_eq!(path, layout.group_dir(group).join(item.to_string()));
    }

    #[tokio::test]
    async fn test_item_path_ignores_traversal_in_name() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path()).await.unwrap();
        let group = Uuid::new_v4();
        let item = Uuid::new_v4();

        let path = layout.item_path(group, item, "../../etc/passwd.txt");
        assert_eq!(path, layout.group_dir(group).join(format!("{}.txt", item)));

        let path = layout.item_path(group, item, "weird.t/x");
        assert_eq!(path.parent(), Some(layout.group_dir(group).as_path()));
    }

    #[tokio::test]
    async fn test_chunk_path_is_zero_padded() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path()).await.unwrap();
        let item = Uuid::new_v4();

        assert_eq!(
            layout.chunk_path(item, 7),
            layout.temp_root().join(item.to_string()).join("chunk.0007")
        );
        assert_eq!(chunk_file_name(12345), "chunk.12345");
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_rejects_outside_root() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("root")).await.unwrap();

        let outside = dir.path().join("elsewhere").join("file.bin");
        let result = layout.ensure_parent_dir(&outside).await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_remove_group_dir_missing_is_ok() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path()).await.unwrap();
        let group = Uuid::new_v4();

        layout.remove_group_dir(group).await.unwrap();

        let file = layout.item_path(group, Uuid::new_v4(), "a.bin");
        layout.ensure_parent_dir(&file).await.unwrap();
        tokio::fs::write(&file, b"x").await.unwrap();
        layout.remove_group_dir(group).await.unwrap();
        assert!(!layout.group_dir(group).exists());
    }
}
