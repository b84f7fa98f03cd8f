//! Route configuration and setup

use crate::handlers;
use crate::middleware::{request_id_middleware, RequestId};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, Request},
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use stowage_core::Config;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Slack for multipart boundaries and the non-file fields of an upload.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Server-wide cap on requests in flight.
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let protected_routes = protected_routes(config).layer(axum::middleware::from_fn_with_state(
        state.clone(),
        crate::auth::middleware::auth_middleware,
    ));

    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.as_str())
            .unwrap_or("-");
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    let app = public_routes()
        .merge(protected_routes)
        .merge(utoipa_rapidoc::RapiDoc::new("/api/openapi.json").path("/docs"))
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(RequestBodyLimitLayer::new(body_limit(
            config
                .max_upload_size_bytes()
                .max(config.max_chunk_size_bytes()),
        )))
        .layer(cors)
        .layer(trace_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}

fn body_limit(bytes: u64) -> usize {
    usize::try_from(bytes.saturating_add(MULTIPART_OVERHEAD_BYTES)).unwrap_or(usize::MAX)
}

/// Public routes (no authentication required)
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
}

/// Protected routes (require a bearer token)
fn protected_routes(config: &Config) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/upload-chunk/start",
            post(handlers::chunked_upload::start_chunked_upload),
        )
        .route(
            "/upload-chunk",
            post(handlers::chunked_upload::upload_chunk)
                .layer(DefaultBodyLimit::max(body_limit(config.max_chunk_size_bytes()))),
        )
        .route("/group", post(handlers::upload_group::create_group))
        .route(
            "/group/{group_id}",
            delete(handlers::upload_group::delete_group),
        )
        .route(
            "/group/{group_id}/items",
            get(handlers::upload_group::list_group_items),
        )
        .route(
            "/group/{group_id}/link",
            post(handlers::upload_group::create_share_link),
        )
        .route(
            "/group/{group_id}/upload",
            post(handlers::streaming_upload::upload_to_group)
                .layer(DefaultBodyLimit::max(body_limit(config.max_upload_size_bytes()))),
        )
}
