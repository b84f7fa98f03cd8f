use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::UploadItemResponse;

/// Upload group entity
///
/// A collection of items sharing one lifecycle; one share link maps to one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadGroup {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub link: Option<ShareLink>,
}

impl UploadGroup {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            link: None,
        }
    }

    /// Whether the retention sweep may delete this group at `now`.
    ///
    /// The group must be older than `grace`, and either have no link or a link
    /// that expired more than `grace` ago.
    pub fn is_eligible_for_deletion(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        if self.created_at > now - grace {
            return false;
        }
        match &self.link {
            None => true,
            Some(link) => link.expires_at < now - grace,
        }
    }
}

impl Default for UploadGroup {
    fn default() -> Self {
        Self::new()
    }
}

/// Shareable link pointing at a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareLink {
    pub code: String,
    pub group_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Response for group creation
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadGroupInfo {
    pub group_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Request to create or roll a group's share link
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareLinkRequest {
    /// Lifetime of the link in hours (defaults to 24)
    #[serde(default)]
    pub ttl_hours: Option<i64>,
}

/// Share link as returned by the API
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShareLinkResponse {
    pub code: String,
    pub group_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl From<ShareLink> for ShareLinkResponse {
    fn from(link: ShareLink) -> Self {
        Self {
            code: link.code,
            group_id: link.group_id,
            expires_at: link.expires_at,
        }
    }
}

/// Group listing with its items
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadGroupResponse {
    pub group_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub items: Vec<UploadItemResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_created(hours_ago: i64, now: DateTime<Utc>) -> UploadGroup {
        UploadGroup {
            id: Uuid::new_v4(),
            created_at: now - Duration::hours(hours_ago),
            link: None,
        }
    }

    #[test]
    fn linkless_group_eligible_after_grace() {
        let now = Utc::now();
        assert!(group_created(25, now).is_eligible_for_deletion(now, Duration::hours(24)));
        assert!(!group_created(1, now).is_eligible_for_deletion(now, Duration::hours(24)));
    }

    #[test]
    fn live_or_recently_expired_link_keeps_group() {
        let now = Utc::now();
        let mut group = group_created(72, now);
        group.link = Some(ShareLink {
            code: "abc".to_string(),
            group_id: group.id,
            created_at: now - Duration::hours(72),
            expires_at: now + Duration::hours(1),
        });
        assert!(!group.is_eligible_for_deletion(now, Duration::hours(24)));

        if let Some(link) = group.link.as_mut() {
            link.expires_at = now - Duration::hours(2);
        }
        assert!(!group.is_eligible_for_deletion(now, Duration::hours(24)));

        if let Some(link) = group.link.as_mut() {
            link.expires_at = now - Duration::hours(30);
        }
        assert!(group.is_eligible_for_deletion(now, Duration::hours(24)));
    }
}
