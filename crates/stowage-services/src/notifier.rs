//! In-process real-time channel for item events
//!
//! Subscribers receive every event and filter by group id themselves.

use async_trait::async_trait;
use stowage_core::{ItemEvent, ItemNotifier};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ItemEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ItemEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl ItemNotifier for BroadcastNotifier {
    async fn notify(&self, event: ItemEvent) {
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::trace!(receivers, "Item event broadcast");
            }
            // No subscribers
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(group_id = %event.group_id, item_id = %event.item_id, "Item event dropped, no subscribers");
            }
        }
    }
}
