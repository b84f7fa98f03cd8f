use crate::auth::models::CallerContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use stowage_core::models::{
    CreateShareLinkRequest, Role, ShareLink, ShareLinkResponse, UploadGroup, UploadGroupInfo,
    UploadGroupResponse, UploadItemResponse,
};
use stowage_core::AppError;
use uuid::Uuid;

const DEFAULT_LINK_TTL_HOURS: i64 = 24;
const MAX_LINK_TTL_HOURS: i64 = 24 * 365;

#[utoipa::path(
    post,
    path = "/group",
    tag = "groups",
    responses(
        (status = 201, description = "Group created", body = UploadGroupInfo),
        (status = 403, description = "Caller may not create groups", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state),
    fields(user_id = %caller.user_id, operation = "create_group")
)]
pub async fn create_group(
    caller: CallerContext,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    caller.require_role(Role::Editor)?;

    let group = UploadGroup::new();
    state.catalog.create_group(&group).await?;

    tracing::info!(group_id = %group.id, "Upload group created");

    Ok((
        StatusCode::CREATED,
        Json(UploadGroupInfo {
            group_id: group.id,
            created_at: group.created_at,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/group/{group_id}/items",
    tag = "groups",
    params(("group_id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Group with its items", body = UploadGroupResponse),
        (status = 403, description = "Token is not valid for this group", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state),
    fields(user_id = %caller.user_id, group_id = %group_id, operation = "list_group_items")
)]
pub async fn list_group_items(
    caller: CallerContext,
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    caller.require(group_id, Role::Viewer)?;

    let group = state.ingest.require_group(group_id).await?;
    let items = state.catalog.list_group_items(group_id).await?;

    Ok(Json(UploadGroupResponse {
        group_id: group.id,
        created_at: group.created_at,
        items: items.into_iter().map(UploadItemResponse::from).collect(),
    }))
}

/// Create the group's share link, replacing any existing one
#[utoipa::path(
    post,
    path = "/group/{group_id}/link",
    tag = "groups",
    params(("group_id" = Uuid, Path, description = "Group ID")),
    request_body(content = CreateShareLinkRequest, description = "Optional; the link lifetime defaults to 24 hours"),
    responses(
        (status = 200, description = "Share link created", body = ShareLinkResponse),
        (status = 400, description = "Invalid lifetime", body = ErrorResponse),
        (status = 403, description = "Caller is not the group owner", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, body),
    fields(user_id = %caller.user_id, group_id = %group_id, operation = "create_share_link")
)]
pub async fn create_share_link(
    caller: CallerContext,
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    body: Option<Json<CreateShareLinkRequest>>,
) -> Result<impl IntoResponse, HttpAppError> {
    caller.require(group_id, Role::Owner)?;

    let ttl_hours = body
        .and_then(|Json(request)| request.ttl_hours)
        .unwrap_or(DEFAULT_LINK_TTL_HOURS);
    if !(1..=MAX_LINK_TTL_HOURS).contains(&ttl_hours) {
        return Err(AppError::InvalidInput(format!(
            "ttlHours must be between 1 and {}",
            MAX_LINK_TTL_HOURS
        ))
        .into());
    }

    state.ingest.require_group(group_id).await?;

    let now = Utc::now();
    let link = ShareLink {
        code: Uuid::new_v4().simple().to_string(),
        group_id,
        created_at: now,
        expires_at: now + Duration::hours(ttl_hours),
    };
    state.catalog.upsert_share_link(&link).await?;

    tracing::info!(expires_at = %link.expires_at, "Share link created");

    Ok(Json(ShareLinkResponse::from(link)))
}

/// Delete a group, its items and its files
#[utoipa::path(
    delete,
    path = "/group/{group_id}",
    tag = "groups",
    params(("group_id" = Uuid, Path, description = "Group ID")),
    responses(
        (status = 204, description = "Group deleted"),
        (status = 403, description = "Caller is not the group owner", body = ErrorResponse),
        (status = 404, description = "Group not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state),
    fields(user_id = %caller.user_id, group_id = %group_id, operation = "delete_group")
)]
pub async fn delete_group(
    caller: CallerContext,
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    caller.require(group_id, Role::Owner)?;

    if !state.catalog.delete_group_cascade(group_id).await? {
        return Err(AppError::NotFound(format!("Group {} not found", group_id)).into());
    }

    // Rows are gone; leftover files are reclaimed by the next sweep.
    if let Err(e) = state.ingest.layout().remove_group_dir(group_id).await {
        tracing::warn!(error = %e, "Failed to remove group directory");
    }

    tracing::info!("Upload group deleted");

    Ok(StatusCode::NO_CONTENT)
}
