//! Issue and issue-comment rows.

use crate::model::OptimisticMeta;
use crate::{RepositoryId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn from_api(value: &str) -> Self {
        match value {
            "open" => Self::Open,
            _ => Self::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// One row per `(repository, number)`.
///
/// `number` is `None` only on an optimistic create stub that GitHub has not
/// yet acknowledged; the accept path fills it in, after which the row is
/// indistinguishable from a webhook-sourced one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub doc_id: String,
    pub repository_id: RepositoryId,
    pub number: Option<u64>,
    pub github_issue_id: Option<u64>,
    pub state: IssueState,
    pub title: String,
    pub body: Option<String>,
    pub author_user_id: Option<UserId>,
    pub author_login: Option<String>,
    pub label_names: Vec<String>,
    pub assignee_user_ids: Vec<UserId>,
    /// GitHub's issues endpoints include pull requests; this flags them.
    pub is_pull_request: bool,
    pub created_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    pub github_updated_at: Option<Timestamp>,
    pub optimistic: Option<OptimisticMeta>,
}

/// Comment rows shared by issues and pull requests (GitHub shares the
/// number space). `github_comment_id` is `None` only on optimistic stubs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    pub doc_id: String,
    pub repository_id: RepositoryId,
    pub issue_number: u64,
    pub github_comment_id: Option<u64>,
    pub author_user_id: Option<UserId>,
    pub author_login: Option<String>,
    pub body: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub optimistic: Option<OptimisticMeta>,
}
