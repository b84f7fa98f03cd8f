//! Stowage Services Layer
//!
//! Orchestration of the ingestion pipeline: both ingest paths end in
//! [`IngestService::register_item`], which writes the catalog row, signals the
//! notifier and queues enrichment. Keep thin HTTP handling in stowage-api.

pub mod chunked;
pub mod ingest;
pub mod notifier;
pub mod streaming;
pub mod sweeper;

pub use chunked::{ChunkProgress, ChunkSessionManager, ChunkUpload, StartUpload};
pub use ingest::IngestService;
pub use notifier::BroadcastNotifier;
pub use streaming::write_stream_to_file;
pub use sweeper::{duration_until_next, RetentionSweeper, SweepReport};
