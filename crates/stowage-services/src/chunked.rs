//! Resumable chunked uploads
//!
//! Sessions live in memory only and are lost on restart. Chunks are written to
//! `<root>/temp/<itemId>/chunk.NNNN` and combined in ascending index order once
//! every index has arrived. The map lock is never held across file I/O; the
//! per-session completion lock serializes the check-and-assemble step.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use stowage_core::constants::STREAM_COPY_BUFFER_BYTES;
use stowage_core::models::UploadItem;
use stowage_core::AppError;
use stowage_storage::remove_dir_best_effort;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::ingest::{validate_file_name, IngestService};

const JANITOR_INTERVAL_SECS: u64 = 15 * 60;

/// Parameters of a new chunked upload
#[derive(Debug, Clone)]
pub struct StartUpload {
    pub group_id: Uuid,
    pub file_name: String,
    pub total_size: u64,
    pub total_chunks: u32,
}

/// Identity of one delivered chunk; must agree with the session it targets
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub item_id: Uuid,
    pub group_id: Uuid,
    pub file_name: String,
    pub total_chunks: u32,
    pub chunk_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    pub item_id: Uuid,
    /// Distinct chunk indices received so far.
    pub received: u32,
    pub total: u32,
    pub complete: bool,
}

#[derive(Debug)]
struct UploadSession {
    item_id: Uuid,
    group_id: Uuid,
    file_name: String,
    total_chunks: u32,
    total_size: u64,
    created_at: DateTime<Utc>,
    last_activity_ms: AtomicI64,
    received: Mutex<BTreeSet<u32>>,
    /// Set once the upload has been assembled and registered.
    completed: Mutex<bool>,
}

impl UploadSession {
    fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_activity_ms.load(Ordering::Relaxed) < cutoff.timestamp_millis()
    }

    fn progress(&self, received: usize, complete: bool) -> ChunkProgress {
        ChunkProgress {
            item_id: self.item_id,
            received: received as u32,
            total: self.total_chunks,
            complete,
        }
    }
}

pub struct ChunkSessionManager {
    ingest: Arc<IngestService>,
    sessions: RwLock<HashMap<Uuid, Arc<UploadSession>>>,
    max_chunk_count: u32,
    max_total_size: u64,
}

impl ChunkSessionManager {
    pub fn new(ingest: Arc<IngestService>, max_chunk_count: u32, max_total_size: u64) -> Self {
        Self {
            ingest,
            sessions: RwLock::new(HashMap::new()),
            max_chunk_count,
            max_total_size,
        }
    }

    /// Open a session and return the item id that keys it.
    ///
    /// Nothing is written to disk or to the catalog yet.
    #[tracing::instrument(skip(self, request), fields(group_id = %request.group_id, total_chunks = request.total_chunks))]
    pub async fn start_upload(&self, request: StartUpload) -> Result<Uuid, AppError> {
        validate_file_name(&request.file_name)?;
        if request.total_chunks == 0 {
            return Err(AppError::InvalidInput(
                "totalChunks must be at least 1".to_string(),
            ));
        }
        if request.total_chunks > self.max_chunk_count {
            return Err(AppError::InvalidInput(format!(
                "totalChunks {} exceeds maximum {}",
                request.total_chunks, self.max_chunk_count
            )));
        }
        if request.total_size > self.max_total_size {
            return Err(AppError::PayloadTooLarge(format!(
                "totalFileSize exceeds the maximum of {} bytes",
                self.max_total_size
            )));
        }
        self.ingest.require_group(request.group_id).await?;

        let item_id = Uuid::new_v4();
        let now = Utc::now();
        let session = Arc::new(UploadSession {
            item_id,
            group_id: request.group_id,
            file_name: request.file_name,
            total_chunks: request.total_chunks,
            total_size: request.total_size,
            created_at: now,
            last_activity_ms: AtomicI64::new(now.timestamp_millis()),
            received: Mutex::new(BTreeSet::new()),
            completed: Mutex::new(false),
        });

        self.sessions.write().await.insert(item_id, session);

        tracing::info!(item_id = %item_id, "Chunked upload session started");
        Ok(item_id)
    }

    /// Store one chunk; the delivery that completes the set assembles the file.
    #[tracing::instrument(skip(self, chunk, data), fields(item_id = %chunk.item_id, chunk = chunk.chunk_number, bytes = data.len()))]
    pub async fn upload_chunk(&self, chunk: ChunkUpload, data: Bytes) -> Result<ChunkProgress, AppError> {
        let session = self
            .sessions
            .read()
            .await
            .get(&chunk.item_id)
            .cloned()
            .ok_or(AppError::SessionNotFound(chunk.item_id))?;

        if chunk.file_name != session.file_name
            || chunk.group_id != session.group_id
            || chunk.total_chunks != session.total_chunks
        {
            tracing::debug!(
                expected_file = %session.file_name,
                expected_total = session.total_chunks,
                "Chunk does not match session"
            );
            return Err(AppError::ChunkMismatch(format!(
                "Chunk metadata does not match upload session {}",
                chunk.item_id
            )));
        }
        if chunk.chunk_number >= session.total_chunks {
            return Err(AppError::InvalidInput(format!(
                "chunkNumber {} is out of range for {} chunks",
                chunk.chunk_number, session.total_chunks
            )));
        }

        let layout = self.ingest.layout();
        write_chunk(
            &layout.session_dir(session.item_id),
            &layout.chunk_path(session.item_id, chunk.chunk_number),
            &data,
        )
        .await?;
        session.touch();

        let received = {
            let mut received = session.received.lock().await;
            received.insert(chunk.chunk_number);
            received.len()
        };

        if received < session.total_chunks as usize {
            return Ok(session.progress(received, false));
        }

        let mut completed = session.completed.lock().await;
        if *completed {
            return Ok(session.progress(received, true));
        }

        self.complete(&session).await?;
        *completed = true;
        self.sessions.write().await.remove(&session.item_id);

        Ok(session.progress(received, true))
    }

    async fn complete(&self, session: &UploadSession) -> Result<(), AppError> {
        let layout = self.ingest.layout();
        let dest = layout.item_path(session.group_id, session.item_id, &session.file_name);
        let chunks: Vec<PathBuf> = (0..session.total_chunks)
            .map(|n| layout.chunk_path(session.item_id, n))
            .collect();

        let size = assemble(session.item_id, &chunks, &dest, layout).await?;
        if size != session.total_size {
            tracing::warn!(
                item_id = %session.item_id,
                declared = session.total_size,
                actual = size,
                "Assembled size differs from declared size"
            );
        }

        let item = UploadItem::new(
            session.item_id,
            session.group_id,
            session.file_name.clone(),
            dest.clone(),
            size as i64,
        );
        if let Err(e) = self.ingest.register_item(item).await {
            if let Err(rm) = fs::remove_file(&dest).await {
                tracing::warn!(error = %rm, path = %dest.display(), "Failed to remove assembled file");
            }
            return Err(e);
        }

        remove_dir_best_effort(&layout.session_dir(session.item_id)).await;

        tracing::info!(
            item_id = %session.item_id,
            chunks = session.total_chunks,
            size,
            open_for_secs = (Utc::now() - session.created_at).num_seconds(),
            "Chunked upload completed"
        );
        Ok(())
    }

    /// Drop sessions idle for longer than `ttl` together with their chunk directories.
    pub async fn evict_expired(&self, ttl: Duration) -> usize {
        let cutoff = Utc::now() - ttl;
        let expired: Vec<Arc<UploadSession>> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<Uuid> = sessions
                .values()
                .filter(|s| s.idle_since(cutoff) && s.completed.try_lock().is_ok())
                .map(|s| s.item_id)
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        let layout = self.ingest.layout();
        for session in &expired {
            tracing::info!(item_id = %session.item_id, "Evicting idle upload session");
            remove_dir_best_effort(&layout.session_dir(session.item_id)).await;
        }
        expired.len()
    }

    /// Item ids of sessions still open.
    pub async fn live_sessions(&self) -> HashSet<Uuid> {
        self.sessions.read().await.keys().copied().collect()
    }

    /// Group of an open session.
    pub async fn session_group(&self, item_id: Uuid) -> Option<Uuid> {
        self.sessions
            .read()
            .await
            .get(&item_id)
            .map(|session| session.group_id)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Periodically evict idle sessions until `shutdown` fires.
    pub fn start_janitor(self: Arc<Self>, ttl: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(JANITOR_INTERVAL_SECS));
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = self.evict_expired(ttl).await;
                        if evicted > 0 {
                            tracing::info!(evicted, "Idle upload sessions evicted");
                        }
                    }
                }
            }
            tracing::debug!("Upload session janitor stopped");
        })
    }
}

/// Write a chunk atomically; a re-delivered index replaces the earlier copy.
async fn write_chunk(session_dir: &Path, path: &Path, data: &[u8]) -> Result<(), AppError> {
    fs::create_dir_all(session_dir).await?;
    let partial = session_dir.join(format!("{}.part", Uuid::new_v4()));
    fs::write(&partial, data).await?;
    if let Err(e) = fs::rename(&partial, path).await {
        let _ = fs::remove_file(&partial).await;
        return Err(e.into());
    }
    Ok(())
}

/// Concatenate `chunks` into `dest` in order.
///
/// Every chunk is checked before the destination is created. Chunk files are
/// left in place; the caller removes the session directory once the item is
/// registered.
async fn assemble(
    item_id: Uuid,
    chunks: &[PathBuf],
    dest: &Path,
    layout: &stowage_storage::StorageLayout,
) -> Result<u64, AppError> {
    let start = Instant::now();

    for (n, chunk) in chunks.iter().enumerate() {
        if !fs::try_exists(chunk).await.unwrap_or(false) {
            tracing::error!(item_id = %item_id, chunk = n, path = %chunk.display(), "Chunk file missing during assembly");
            return Err(AppError::ChunkMissing {
                item_id,
                chunk: n as u32,
            });
        }
    }

    layout.ensure_parent_dir(dest).await?;
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", dest.display(), e)))?;
    let mut writer = BufWriter::with_capacity(STREAM_COPY_BUFFER_BYTES, file);

    let copied = copy_chunks(item_id, chunks, &mut writer).await;
    let size = match copied {
        Ok(size) => size,
        Err(e) => {
            drop(writer);
            if let Err(rm) = fs::remove_file(dest).await {
                tracing::warn!(error = %rm, path = %dest.display(), "Failed to remove partial assembly");
            }
            return Err(e);
        }
    };

    tracing::debug!(
        item_id = %item_id,
        size,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Chunks assembled"
    );
    Ok(size)
}

async fn copy_chunks(
    item_id: Uuid,
    chunks: &[PathBuf],
    writer: &mut BufWriter<fs::File>,
) -> Result<u64, AppError> {
    let mut size = 0;
    for (n, chunk) in chunks.iter().enumerate() {
        let mut source = match fs::File::open(chunk).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::ChunkMissing {
                    item_id,
                    chunk: n as u32,
                })
            }
            Err(e) => return Err(e.into()),
        };
        size += tokio::io::copy(&mut source, writer).await?;
    }
    writer.flush().await?;
    writer.get_ref().sync_all().await?;
    Ok(size)
}
