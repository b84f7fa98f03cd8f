//! Stowage Core Library
//!
//! Domain models, error types, configuration and integration hooks shared by
//! every Stowage crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod hooks;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use hooks::{ItemEvent, ItemEventKind, ItemNotifier, NoOpNotifier};
