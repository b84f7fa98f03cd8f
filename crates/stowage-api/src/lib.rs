//! Stowage API Library
//!
//! HTTP handlers, authentication, error mapping and application setup.

mod api_doc;
mod handlers;
mod middleware;

pub mod auth;
pub mod error;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use api_doc::get_openapi_spec;
pub use error::ErrorResponse;
