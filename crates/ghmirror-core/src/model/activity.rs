//! Derived projection rows: the activity feed and the repo overview.

use crate::{RepositoryId, Timestamp};
use serde::{Deserialize, Serialize};

/// Append-only feed entry. Never patched or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// ULID; sorts by creation time within a millisecond.
    pub activity_id: String,
    pub repository_id: RepositoryId,
    pub created_at: Timestamp,
    /// Dotted type tag, e.g. `issue.opened`, `pr.merged`,
    /// `check_run.failure`.
    pub activity_type: String,
    pub title: String,
    pub actor_login: Option<String>,
    pub entity_number: Option<u64>,
}

impl ActivityEntry {
    /// Entry with a deterministic id derived from the webhook delivery.
    ///
    /// Replaying the same delivery rewrites the same feed row instead of
    /// appending a duplicate, which keeps replay idempotent end to end.
    pub fn for_delivery(
        delivery_id: &str,
        repository_id: RepositoryId,
        activity_type: impl Into<String>,
        title: impl Into<String>,
        actor_login: Option<String>,
        entity_number: Option<u64>,
        occurred_at: Timestamp,
    ) -> Self {
        let activity_type = activity_type.into();
        Self {
            activity_id: format!("{}:{}", delivery_id, activity_type),
            repository_id,
            created_at: occurred_at,
            activity_type,
            title: title.into(),
            actor_login,
            entity_number,
        }
    }

    pub fn new(
        repository_id: RepositoryId,
        activity_type: impl Into<String>,
        title: impl Into<String>,
        actor_login: Option<String>,
        entity_number: Option<u64>,
        now: Timestamp,
    ) -> Self {
        Self {
            activity_id: crate::model::new_doc_id(),
            repository_id,
            created_at: now,
            activity_type: activity_type.into(),
            title: title.into(),
            actor_login,
            entity_number,
        }
    }
}

/// Per-repository overview counters, recomputed after every domain write
/// from the aggregate indexes (never by table scan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoOverview {
    pub repository_id: RepositoryId,
    pub open_pr_count: u64,
    pub open_issue_count: u64,
    pub failing_check_count: u64,
    pub last_push_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}
