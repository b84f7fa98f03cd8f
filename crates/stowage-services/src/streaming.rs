//! Streaming body writer
//!
//! Copies a byte stream to a new file through a fixed-size buffer. The whole
//! payload is never held in memory.

use bytes::Bytes;
use futures::{pin_mut, Stream, StreamExt};
use std::fmt::Display;
use std::path::Path;
use std::time::Instant;
use stowage_core::constants::STREAM_COPY_BUFFER_BYTES;
use stowage_core::AppError;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Write `stream` to `dest`, which must not exist yet.
///
/// Returns the length of the written file. On any failure the partial file is
/// removed. `max_bytes` caps the accepted payload size.
pub async fn write_stream_to_file<S, E>(
    stream: S,
    dest: &Path,
    max_bytes: Option<u64>,
) -> Result<u64, AppError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let start = Instant::now();
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .await
        .map_err(|e| {
            AppError::Storage(format!("Failed to create {}: {}", dest.display(), e))
        })?;

    let mut writer = BufWriter::with_capacity(STREAM_COPY_BUFFER_BYTES, file);

    match copy_stream(stream, &mut writer, max_bytes).await {
        Ok(()) => {}
        Err(e) => {
            drop(writer);
            discard_partial(dest).await;
            return Err(e);
        }
    }

    let size = match fs::metadata(dest).await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            discard_partial(dest).await;
            return Err(e.into());
        }
    };

    tracing::debug!(
        path = %dest.display(),
        size,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Stream written to disk"
    );

    Ok(size)
}

async fn copy_stream<S, E>(
    stream: S,
    writer: &mut BufWriter<fs::File>,
    max_bytes: Option<u64>,
) -> Result<(), AppError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    pin_mut!(stream);
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Failed to read upload body: {}", e)))?;
        written += chunk.len() as u64;
        if let Some(limit) = max_bytes {
            if written > limit {
                return Err(AppError::PayloadTooLarge(format!(
                    "Upload exceeds the maximum of {} bytes",
                    limit
                )));
            }
        }
        writer.write_all(&chunk).await?;
    }

    writer.flush().await?;
    writer.get_ref().sync_all().await?;
    Ok(())
}

async fn discard_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %e, path = %path.display(), "Failed to remove partial upload");
        }
    }
}
