//! Single-request upload into a group
//!
//! The multipart body is consumed field by field and the file part is streamed
//! straight to its final location, so payload size is bounded only by the
//! configured limit, not by memory.

use crate::auth::models::CallerContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stowage_core::models::Role;
use stowage_core::AppError;
use utoipa::ToSchema;
use uuid::Uuid;

/// Multipart form of a single-shot upload (documentation only)
#[allow(dead_code)]
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupUploadForm {
    /// Overrides the file name of the file part; must precede it
    pub file_name: Option<String>,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupUploadResponse {
    pub item_id: Uuid,
    pub file_name: String,
    pub size: i64,
}

/// Upload a file into a group in one request
#[utoipa::path(
    post,
    path = "/group/{group_id}/upload",
    tag = "uploads",
    params(("group_id" = Uuid, Path, description = "Group ID")),
    request_body(content = GroupUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = GroupUploadResponse),
        (status = 400, description = "Malformed multipart body or no file part", body = ErrorResponse),
        (status = 403, description = "Caller may not upload to this group", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse),
        (status = 413, description = "Upload too large", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_to_group(
    caller: CallerContext,
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    // Checked before any body bytes are read.
    caller.require(group_id, Role::Editor)?;
    state.ingest.require_group(group_id).await?;

    let max_bytes = Some(state.config.max_upload_size_bytes());
    let mut file_name: Option<String> = None;
    let mut stored = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "fileName" => {
                let value = field.text().await?;
                if !value.trim().is_empty() {
                    file_name = Some(value);
                }
            }
            "file" => {
                let name = file_name
                    .take()
                    .or_else(|| field.file_name().map(str::to_string))
                    .ok_or_else(|| {
                        AppError::BadRequest("No file name supplied for the file part".to_string())
                    })?;
                stored = Some(
                    state
                        .ingest
                        .store_stream(group_id, &name, field, max_bytes)
                        .await?,
                );
                break;
            }
            _ => {}
        }
    }

    let item = stored
        .ok_or_else(|| AppError::BadRequest("Multipart body contains no file part".to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(GroupUploadResponse {
            item_id: item.id,
            file_name: item.file_name,
            size: item.size,
        }),
    ))
}
