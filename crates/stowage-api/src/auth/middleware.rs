use crate::auth::models::CallerContext;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use stowage_core::AppError;

/// Validate the bearer token and attach the `CallerContext`.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    let Some(token) = token else {
        return HttpAppError(AppError::Unauthorized(
            "Missing or malformed Authorization header".to_string(),
        ))
        .into_response();
    };

    let claims = match state.jwt.validate_token(token) {
        Ok(claims) => claims,
        Err(e) => return HttpAppError(e).into_response(),
    };

    tracing::debug!(user_id = %claims.sub, group_id = ?claims.group_id, role = %claims.role, "Caller authenticated");

    request
        .extensions_mut()
        .insert(CallerContext::from(claims));

    next.run(request).await
}
