//! Branch and commit rows.

use crate::{RepositoryId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// One row per `(repository, branch name)`. Deleted on branch-deletion
/// events — the only domain delete besides comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub repository_id: RepositoryId,
    pub name: String,
    pub head_sha: String,
    pub protected: bool,
    pub updated_at: Timestamp,
}

/// One row per `(repository, sha)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub repository_id: RepositoryId,
    pub sha: String,
    /// First line of the commit message.
    pub message_headline: String,
    pub author_login: Option<String>,
    pub author_user_id: Option<UserId>,
    pub authored_at: Option<Timestamp>,
    pub committed_at: Option<Timestamp>,
}

impl Commit {
    /// Headline = message up to the first newline, trimmed.
    pub fn headline(message: &str) -> String {
        message.lines().next().unwrap_or_default().trim().to_string()
    }
}
