//! Mirrored repository rows.

use crate::{InstallationId, RepositoryId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Repository visibility as reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Internal,
}

impl Visibility {
    pub fn from_api(value: Option<&str>, private: bool) -> Self {
        match value {
            Some("public") => Self::Public,
            Some("internal") => Self::Internal,
            Some("private") => Self::Private,
            _ if private => Self::Private,
            _ => Self::Public,
        }
    }
}

/// The mirrored repo. `full_name` is unique; rows are created by the
/// connect flow or auto-discovery and updated by webhooks and bootstrap,
/// never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub repository_id: RepositoryId,
    pub installation_id: Option<InstallationId>,
    pub owner_login: String,
    pub name: String,
    pub full_name: String,
    pub default_branch: String,
    pub private: bool,
    pub visibility: Visibility,
    /// User whose OAuth token bootstrap prefers; set by the connect flow.
    pub connected_by_user_id: Option<UserId>,
    pub stargazers_count: Option<u64>,
    /// When the mirror last refreshed this row.
    pub cached_at: Timestamp,
    pub github_updated_at: Option<Timestamp>,
}

impl Repository {
    /// Minimal row for a repository first seen through a webhook.
    /// A reconcile job hydrates the remaining metadata asynchronously.
    pub fn stub(
        repository_id: RepositoryId,
        installation_id: Option<InstallationId>,
        owner_login: String,
        name: String,
        full_name: String,
        now: Timestamp,
    ) -> Self {
        Self {
            repository_id,
            installation_id,
            owner_login,
            name,
            full_name,
            default_branch: "main".to_string(),
            private: false,
            visibility: Visibility::Public,
            connected_by_user_id: None,
            stargazers_count: None,
            cached_at: now,
            github_updated_at: None,
        }
    }

    /// Sort key for bootstrap priority: more-starred repositories first.
    pub fn priority_sort_key(&self) -> i64 {
        -(self.stargazers_count.unwrap_or(0) as i64)
    }
}
