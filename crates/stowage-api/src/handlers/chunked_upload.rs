//! Chunked upload handlers for large file uploads.
//!
//! A session is opened with the declared file name, size and chunk count; chunks
//! then arrive as multipart requests in any order. The request that delivers the
//! last missing chunk assembles the file and gets `isComplete = true`.

use crate::auth::models::CallerContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stowage_core::models::Role;
use stowage_core::AppError;
use stowage_services::{ChunkUpload, StartUpload};
use utoipa::ToSchema;
use uuid::Uuid;

/// Request to start a chunked upload
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartChunkedUploadRequest {
    /// Original file name
    pub file_name: String,
    /// Number of chunks the client will send
    pub total_chunks: u32,
    /// Total file size in bytes
    pub total_file_size: u64,
    /// Target group; defaults to the group the token is scoped to
    #[serde(default)]
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartChunkedUploadResponse {
    /// Item id; also identifies the upload session
    pub item_id: Uuid,
}

/// Multipart form of a chunk upload (documentation only)
#[allow(dead_code)]
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadChunkForm {
    pub item_id: Uuid,
    pub file_name: String,
    pub chunk_number: u32,
    pub total_chunks: u32,
    /// Defaults to the token's group, else the group the session was started in
    pub group_id: Option<Uuid>,
    #[schema(value_type = String, format = Binary)]
    pub chunk: Vec<u8>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadResponse {
    pub item_id: Uuid,
    /// Distinct chunks received so far
    pub chunk_received: u32,
    pub total_chunks: u32,
    pub is_complete: bool,
}

/// Start a chunked upload session
#[utoipa::path(
    post,
    path = "/upload-chunk/start",
    tag = "uploads",
    request_body = StartChunkedUploadRequest,
    responses(
        (status = 200, description = "Upload session started", body = StartChunkedUploadResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Caller may not upload to this group", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse),
        (status = 413, description = "Declared size too large", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn start_chunked_upload(
    caller: CallerContext,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<StartChunkedUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let group_id = caller.resolve_group(request.group_id)?;
    caller.require(group_id, Role::Editor)?;

    let item_id = state
        .sessions
        .start_upload(StartUpload {
            group_id,
            file_name: request.file_name,
            total_size: request.total_file_size,
            total_chunks: request.total_chunks,
        })
        .await?;

    Ok(Json(StartChunkedUploadResponse { item_id }))
}

/// Upload one chunk of an open session
#[utoipa::path(
    post,
    path = "/upload-chunk",
    tag = "uploads",
    request_body(content = UploadChunkForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Chunk stored", body = ChunkUploadResponse),
        (status = 400, description = "Malformed request or chunk does not match session", body = ErrorResponse),
        (status = 403, description = "Caller may not upload to this group", body = ErrorResponse),
        (status = 404, description = "Upload session not found", body = ErrorResponse),
        (status = 500, description = "Assembly failed", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_chunk(
    caller: CallerContext,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    caller.require_role(Role::Editor)?;

    let mut item_id: Option<Uuid> = None;
    let mut file_name: Option<String> = None;
    let mut chunk_number: Option<u32> = None;
    let mut total_chunks: Option<u32> = None;
    let mut group_id: Option<Uuid> = None;
    let mut data = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "itemId" => item_id = Some(parse_field("itemId", &field.text().await?)?),
            "fileName" => file_name = Some(field.text().await?),
            "chunkNumber" => {
                chunk_number = Some(parse_field("chunkNumber", &field.text().await?)?)
            }
            "totalChunks" => {
                total_chunks = Some(parse_field("totalChunks", &field.text().await?)?)
            }
            "groupId" => group_id = Some(parse_field("groupId", &field.text().await?)?),
            "chunk" => data = Some(field.bytes().await?),
            _ => {}
        }
    }

    let item_id = required("itemId", item_id)?;
    let group_id = match (caller.group_id, group_id) {
        // Unscoped callers may omit groupId on chunks; the session knows it.
        (None, None) => state
            .sessions
            .session_group(item_id)
            .await
            .ok_or(AppError::SessionNotFound(item_id))?,
        _ => caller.resolve_group(group_id)?,
    };

    let chunk = ChunkUpload {
        item_id,
        group_id,
        file_name: required("fileName", file_name)?,
        total_chunks: required("totalChunks", total_chunks)?,
        chunk_number: required("chunkNumber", chunk_number)?,
    };
    let data = required("chunk", data)?;
    caller.require(chunk.group_id, Role::Editor)?;

    let progress = state.sessions.upload_chunk(chunk, data).await?;

    Ok(Json(ChunkUploadResponse {
        item_id: progress.item_id,
        chunk_received: progress.received,
        total_chunks: progress.total,
        is_complete: progress.complete,
    }))
}

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid value for {}", name)))
}

fn required<T>(name: &str, value: Option<T>) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::BadRequest(format!("Missing multipart field {}", name)))
}
