//! Test helpers: build the full application against the in-memory catalog and
//! a temporary storage root.
//!
//! Run from workspace root: `cargo test -p stowage-api`.

#![allow(dead_code)]

pub mod auth;

use axum_test::TestServer;
use std::sync::Arc;
use stowage_api::setup::initialize_app;
use stowage_api::state::AppState;
use stowage_core::config::StowageConfig;
use stowage_core::Config;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Test application: server, shared state and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub shutdown: CancellationToken,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Create a group through the API with an unscoped editor token.
    pub async fn create_group(&self) -> Uuid {
        let response = self
            .server
            .post("/group")
            .add_header("Authorization", auth::bearer(auth::editor_token()))
            .await;
        assert_eq!(response.status_code(), 201);
        let body: serde_json::Value = response.json();
        body["groupId"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("groupId in response")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Setup test app, letting the caller adjust the configuration first.
pub async fn setup_test_app_with(configure: impl FnOnce(&mut StowageConfig)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    let mut inner = StowageConfig::with_defaults(temp_dir.path(), auth::TEST_JWT_SECRET);
    inner.worker_concurrency = 2;
    configure(&mut inner);

    let shutdown = CancellationToken::new();
    let app = initialize_app(Config::new(inner), shutdown.clone())
        .await
        .expect("Failed to initialize app");

    let server = TestServer::new(app.router).expect("Failed to create test server");

    TestApp {
        server,
        state: app.state,
        shutdown,
        _temp_dir: temp_dir,
    }
}
