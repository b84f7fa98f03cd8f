use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

type Action = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Deferred unit of background work
///
/// Runs at most once, on whichever worker dequeues it. The action receives the
/// pool's shutdown token.
pub struct WorkItem {
    label: String,
    action: Action,
}

impl WorkItem {
    pub fn new<F, Fut>(label: impl Into<String>, action: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            label: label.into(),
            action: Box::new(move |token| Box::pin(action(token))),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn into_parts(self) -> (String, Action) {
        (self.label, self.action)
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem").field("label", &self.label).finish()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("work queue is closed")]
pub struct QueueClosed;

/// Producer handle of the work queue. Cheap to clone; submission never blocks.
#[derive(Clone)]
pub struct WorkQueue {
    tx: mpsc::UnboundedSender<WorkItem>,
}

/// Consumer side, owned by the worker pool
pub struct WorkReceiver {
    rx: mpsc::UnboundedReceiver<WorkItem>,
}

impl WorkQueue {
    pub fn new() -> (WorkQueue, WorkReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (WorkQueue { tx }, WorkReceiver { rx })
    }

    pub fn submit(&self, item: WorkItem) -> Result<(), QueueClosed> {
        let label = item.label.clone();
        self.tx.send(item).map_err(|_| {
            tracing::error!(work_item = %label, "Work queue closed, dropping item");
            QueueClosed
        })?;
        tracing::debug!(work_item = %label, "Work item queued");
        Ok(())
    }
}

impl WorkReceiver {
    pub(crate) async fn recv(&mut self) -> Option<WorkItem> {
        self.rx.recv().await
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
