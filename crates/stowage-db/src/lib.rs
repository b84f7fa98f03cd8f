//! Stowage catalog
//!
//! The `Catalog` trait is the boundary between the ingestion pipeline and the
//! store holding groups, share links and item records. Two implementations are
//! provided: PostgreSQL through sqlx, and an in-memory store for single-process
//! deployments and tests.

pub mod catalog;
pub mod memory;
pub mod postgres;

pub use catalog::{Catalog, CatalogResult};
pub use memory::InMemoryCatalog;
pub use postgres::{run_migrations, PgCatalog};
