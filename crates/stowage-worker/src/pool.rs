//! Bounded worker pool
//!
//! A single dispatch loop admits work items while fewer than `concurrency` are
//! in flight. The semaphore is the authoritative bound; the join set tracks the
//! running tasks so their outcome can be logged and drained on shutdown.

use crate::queue::WorkReceiver;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run the dispatch loop on its own task.
    pub fn spawn(self, rx: WorkReceiver, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(rx, shutdown).await })
    }

    /// Dispatch until `shutdown` fires or every producer is gone, then wait for
    /// in-flight items to finish. Items still queued at shutdown are dropped.
    pub async fn run(self, mut rx: WorkReceiver, shutdown: CancellationToken) {
        tracing::info!(max_workers = self.concurrency, "Worker pool started");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut in_flight: JoinSet<()> = JoinSet::new();
        let mut closed = false;

        loop {
            let has_capacity = in_flight.len() < self.concurrency;

            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(in_flight = in_flight.len(), queued = rx.len(), "Worker pool shutting down");
                    break;
                }
                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join_result(result);
                }
                item = rx.recv(), if has_capacity && !closed => match item {
                    Some(item) => {
                        let permit = match semaphore.clone().acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => break,
                        };
                        let (label, action) = item.into_parts();
                        let token = shutdown.clone();

                        in_flight.spawn(async move {
                            let _permit = permit;
                            let start = Instant::now();
                            match action(token).await {
                                Ok(()) => tracing::debug!(
                                    work_item = %label,
                                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                                    "Work item completed"
                                ),
                                Err(e) => tracing::error!(
                                    error = %e,
                                    work_item = %label,
                                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                                    "Work item failed"
                                ),
                            }
                        });
                    }
                    None => closed = true,
                },
                else => break,
            }

            if closed && in_flight.is_empty() {
                break;
            }
        }

        while let Some(result) = in_flight.join_next().await {
            log_join_result(result);
        }

        tracing::info!("Worker pool stopped");
    }
}

fn log_join_result(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(error = %e, "Work item panicked");
        } else {
            tracing::warn!(error = %e, "Work item task was cancelled");
        }
    }
}
