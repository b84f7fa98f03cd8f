//! Recursive filesystem walks used by the retention sweep

use crate::error::StorageResult;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

/// List every regular file under `root`, not descending into `skip`.
pub async fn list_files(root: &Path, skip: &[PathBuf]) -> StorageResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                if !skip.contains(&path) {
                    pending.push(path);
                }
            } else if file_type.is_file() {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Remove every empty directory below `root`, deepest first.
///
/// `root` itself and the `skip` directories are kept. Returns the number of
/// directories removed; failures are logged and skipped.
pub async fn prune_empty_dirs(root: &Path, skip: &[PathBuf]) -> StorageResult<usize> {
    let mut dirs = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() && !skip.contains(&path) {
                dirs.push(path.clone());
                pending.push(path);
            }
        }
    }

    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));

    let mut removed = 0;
    for dir in dirs {
        match is_empty_dir(&dir).await {
            Ok(true) => match fs::remove_dir(&dir).await {
                Ok(()) => {
                    tracing::debug!(path = %dir.display(), "Removed empty directory");
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %dir.display(),
                        "Failed to remove empty directory"
                    );
                }
            },
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, path = %dir.display(), "Failed to inspect directory");
            }
        }
    }

    Ok(removed)
}

/// Immediate subdirectories of `dir` with their modification time.
pub async fn list_child_dirs(dir: &Path) -> StorageResult<Vec<(PathBuf, SystemTime)>> {
    let mut children = Vec::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(children),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if metadata.is_dir() {
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            children.push((entry.path(), modified));
        }
    }

    Ok(children)
}

/// Remove a directory tree, logging instead of failing.
pub async fn remove_dir_best_effort(dir: &Path) -> bool {
    match fs::remove_dir_all(dir).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            tracing::warn!(error = %e, path = %dir.display(), "Failed to remove directory");
            false
        }
    }
}

async fn is_empty_dir(dir: &Path) -> std::io::Result<bool> {
    let mut entries = fs::read_dir(dir).await?;
    Ok(entries.next_entry().await?.is_none())
}
