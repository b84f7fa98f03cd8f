use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use stowage_api::auth::Claims;
use stowage_core::models::Role;
use uuid::Uuid;

/// Test JWT secret (must match setup_test_app).
pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";

/// Mint a token for `role`, optionally scoped to one group.
pub fn token(role: Role, group_id: Option<Uuid>) -> String {
    let claims = Claims {
        sub: "test-user".to_string(),
        group_id,
        role,
        exp: (Utc::now() + Duration::hours(1)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("Failed to encode token")
}

pub fn editor_token() -> String {
    token(Role::Editor, None)
}

pub fn owner_token() -> String {
    token(Role::Owner, None)
}

pub fn viewer_token() -> String {
    token(Role::Viewer, None)
}

pub fn bearer(token: String) -> String {
    format!("Bearer {}", token)
}
