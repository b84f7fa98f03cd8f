use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use stowage_core::models::Role;
use stowage_core::AppError;
use uuid::Uuid;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Group the token is scoped to; unscoped tokens may act on any group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    pub role: Role,
    pub exp: i64,
}

/// Authenticated caller, stored in request extensions by the auth middleware
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub user_id: String,
    pub group_id: Option<Uuid>,
    pub role: Role,
}

impl From<Claims> for CallerContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            group_id: claims.group_id,
            role: claims.role,
        }
    }
}

impl CallerContext {
    pub fn require_role(&self, required: Role) -> Result<(), AppError> {
        if self.role.allows(required) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "This action requires the {} role",
                required
            )))
        }
    }

    /// Check that the caller may act on `group_id` with at least `required`.
    pub fn require(&self, group_id: Uuid, required: Role) -> Result<(), AppError> {
        if let Some(scoped) = self.group_id {
            if scoped != group_id {
                return Err(AppError::Forbidden(
                    "Token is not valid for this group".to_string(),
                ));
            }
        }
        self.require_role(required)
    }

    /// Group targeted by a request: the token's scope, or the explicit id for
    /// unscoped tokens.
    pub fn resolve_group(&self, requested: Option<Uuid>) -> Result<Uuid, AppError> {
        match (self.group_id, requested) {
            (Some(scoped), Some(requested)) if scoped != requested => Err(AppError::Forbidden(
                "Token is not valid for this group".to_string(),
            )),
            (Some(scoped), _) => Ok(scoped),
            (None, Some(requested)) => Ok(requested),
            (None, None) => Err(AppError::BadRequest("groupId is required".to_string())),
        }
    }
}

// Extension cannot be combined with Multipart, so the context is read from parts directly
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerContext>()
            .cloned()
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Missing caller context".to_string(),
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(group_id: Option<Uuid>, role: Role) -> CallerContext {
        CallerContext {
            user_id: "u".to_string(),
            group_id,
            role,
        }
    }

    #[test]
    fn test_scoped_caller_cannot_touch_other_groups() {
        let group = Uuid::new_v4();
        let c = caller(Some(group), Role::Owner);
        assert!(c.require(group, Role::Owner).is_ok());
        assert!(matches!(
            c.require(Uuid::new_v4(), Role::Viewer),
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(c.resolve_group(None).unwrap(), group);
        assert!(c.resolve_group(Some(Uuid::new_v4())).is_err());
    }

    #[test]
    fn test_viewer_cannot_upload() {
        let group = Uuid::new_v4();
        let c = caller(None, Role::Viewer);
        assert!(c.require(group, Role::Viewer).is_ok());
        assert!(matches!(
            c.require(group, Role::Editor),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            c.resolve_group(None),
            Err(AppError::BadRequest(_))
        ));
    }
}
