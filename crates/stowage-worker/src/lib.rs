//! Stowage Worker Library
//!
//! An unbounded in-process queue of deferred actions and the pool that runs
//! them under a fixed concurrency cap. Work items are not persisted; anything
//! still queued when the process stops is lost.

pub mod pool;
pub mod queue;

pub use pool::WorkerPool;
pub use queue::{QueueClosed, WorkItem, WorkQueue, WorkReceiver};
