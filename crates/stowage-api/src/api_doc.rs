//! OpenAPI documentation.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use stowage_core::models;

/// Registers the bearer JWT scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stowage API",
        description = "File ingestion service: resumable chunked uploads, streaming single-shot uploads, upload groups with share links, and background metadata enrichment.",
    ),
    paths(
        handlers::health::health_check,
        handlers::chunked_upload::start_chunked_upload,
        handlers::chunked_upload::upload_chunk,
        handlers::streaming_upload::upload_to_group,
        handlers::upload_group::create_group,
        handlers::upload_group::list_group_items,
        handlers::upload_group::create_share_link,
        handlers::upload_group::delete_group,
    ),
    components(
        schemas(
            // Uploads
            handlers::chunked_upload::StartChunkedUploadRequest,
            handlers::chunked_upload::StartChunkedUploadResponse,
            handlers::chunked_upload::UploadChunkForm,
            handlers::chunked_upload::ChunkUploadResponse,
            handlers::streaming_upload::GroupUploadForm,
            handlers::streaming_upload::GroupUploadResponse,
            // Groups
            models::UploadGroupInfo,
            models::UploadGroupResponse,
            models::UploadItemResponse,
            models::CreateShareLinkRequest,
            models::ShareLinkResponse,
            // Health
            handlers::health::HealthResponse,
            // Error
            error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "uploads", description = "Chunked and single-shot upload operations"),
        (name = "groups", description = "Upload group lifecycle and share links"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
