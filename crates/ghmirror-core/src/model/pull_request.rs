//! Pull request rows and their satellites.

use crate::model::OptimisticMeta;
use crate::{RepositoryId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Pull request state. GitHub models merged as closed-with-`merged_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
}

impl PrState {
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
/// `github_updated_at` drives the out-of-order guard: the stored value is
/// the max ever observed, and older incoming writes are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub repository_id: RepositoryId,
    pub number: u64,
    pub github_pr_id: u64,
    pub title: String,
    pub state: PrState,
    pub draft: bool,
    pub author_user_id: Option<UserId>,
    pub author_login: Option<String>,
    pub head_sha: String,
    pub head_ref_name: String,
    pub base_ref_name: String,
    pub mergeable_state: Option<String>,
    pub merged_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub github_updated_at: Option<Timestamp>,
    pub optimistic: Option<OptimisticMeta>,
}

/// Review rows, keyed by `(repository, pr number, github review id)`.
/// Optimistic submissions start without the GitHub id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestReview {
    pub doc_id: String,
    pub repository_id: RepositoryId,
    pub pull_request_number: u64,
    pub github_review_id: Option<u64>,
    pub author_user_id: Option<UserId>,
    pub author_login: Option<String>,
    pub state: String,
    pub body: Option<String>,
    pub submitted_at: Option<Timestamp>,
    pub commit_sha: Option<String>,
    pub optimistic: Option<OptimisticMeta>,
}

/// Inline review comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestReviewComment {
    pub repository_id: RepositoryId,
    pub pull_request_number: u64,
    pub github_comment_id: u64,
    pub author_user_id: Option<UserId>,
    pub author_login: Option<String>,
    pub body: String,
    pub path: String,
    pub line: Option<u64>,
    pub side: Option<String>,
    pub in_reply_to_github_review_comment_id: Option<u64>,
    pub commit_sha: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One changed file of a pull request at a given head SHA.
///
/// The file set is replaced wholesale when the head moves; `head_sha`
/// identity (not a timestamp) is the staleness guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestFile {
    pub repository_id: RepositoryId,
    pub pull_request_number: u64,
    pub filename: String,
    pub head_sha: String,
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub patch: Option<String>,
}
