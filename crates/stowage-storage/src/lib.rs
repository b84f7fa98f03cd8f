//! Stowage Storage Library
//!
//! On-disk layout of the shared storage root and the filesystem primitives the
//! ingest paths and the retention sweep build on.
//!
//! # Layout
//!
//! - final files: `<root>/<groupId>/<itemId><ext>`
//! - in-flight chunks: `<root>/temp/<itemId>/chunk.NNNN`
//! - enrichment side-assets: `<root>/assets/<name>`
//!
//! `temp/` and `assets/` are reserved and never hold catalog-referenced files.

pub mod error;
pub mod layout;
pub mod walk;

pub use error::{StorageError, StorageResult};
pub use layout::StorageLayout;
pub use walk::{list_child_dirs, list_files, prune_empty_dirs, remove_dir_best_effort};
