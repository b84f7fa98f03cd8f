//! Integration hooks
//!
//! The ingestion pipeline signals item lifecycle events to an external
//! real-time channel keyed by group id. The transport is supplied by the host
//! application through the `ItemNotifier` trait.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemEventKind {
    Created,
    Updated,
}

/// Item lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEvent {
    pub group_id: Uuid,
    pub item_id: Uuid,
    pub kind: ItemEventKind,
}

impl ItemEvent {
    pub fn created(group_id: Uuid, item_id: Uuid) -> Self {
        Self {
            group_id,
            item_id,
            kind: ItemEventKind::Created,
        }
    }

    pub fn updated(group_id: Uuid, item_id: Uuid) -> Self {
        Self {
            group_id,
            item_id,
            kind: ItemEventKind::Updated,
        }
    }
}

/// Fire-and-forget sink for item events.
///
/// Implementations must not fail the caller; delivery problems are theirs to log.
#[async_trait]
pub trait ItemNotifier: Send + Sync {
    async fn notify(&self, event: ItemEvent);
}

/// No-op implementation for when no real-time channel is configured
pub struct NoOpNotifier;

#[async_trait]
impl ItemNotifier for NoOpNotifier {
    async fn notify(&self, _event: ItemEvent) {}
}
