//! Typed webhook payload structures.
//!
//! One envelope struct per event family the dispatcher routes. Decoding is
//! strict about the fields the pipeline relies on and silent about
//! everything else; a payload that fails to decode is a deterministic
//! failure and the raw event is failed without retry.

use serde::{Deserialize, Serialize};

/// Account object embedded in webhook payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookUser {
    pub id: u64,
    pub login: String,
    pub avatar_url: Option<String>,
    #[serde(rename = "type", default)]
    pub user_type: Option<String>,
}

/// Repository object embedded in webhook payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookRepository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner: WebhookUser,
    #[serde(default)]
    pub private: bool,
    pub default_branch: Option<String>,
    pub visibility: Option<String>,
    pub stargazers_count: Option<u64>,
    pub updated_at: Option<String>,
}

/// `installation` reference present on app-delivered events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookInstallationRef {
    pub id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookLabel {
    pub name: String,
}

/// Issue object; `pull_request` presence marks a PR-backed issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookIssue {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub user: Option<WebhookUser>,
    #[serde(default)]
    pub labels: Vec<WebhookLabel>,
    #[serde(default)]
    pub assignees: Vec<WebhookUser>,
    pub pull_request: Option<serde_json::Value>,
    pub created_at: Option<String>,
    pub updated_at: String,
    pub closed_at: Option<String>,
}

/// Head/base ref of a pull request payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPullRef {
    pub sha: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPull {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub draft: bool,
    pub user: Option<WebhookUser>,
    pub head: WebhookPullRef,
    pub base: WebhookPullRef,
    pub mergeable_state: Option<String>,
    pub merged_at: Option<String>,
    pub closed_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: String,
    #[serde(default)]
    pub labels: Vec<WebhookLabel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookComment {
    pub id: u64,
    pub user: Option<WebhookUser>,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookReview {
    pub id: u64,
    pub user: Option<WebhookUser>,
    pub state: String,
    pub body: Option<String>,
    pub submitted_at: Option<String>,
    pub commit_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookReviewComment {
    pub id: u64,
    pub user: Option<WebhookUser>,
    pub body: String,
    pub path: String,
    pub line: Option<u64>,
    pub side: Option<String>,
    pub in_reply_to_id: Option<u64>,
    pub commit_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookCheckRun {
    pub id: u64,
    pub name: Option<String>,
    pub head_sha: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookWorkflowRun {
    pub id: u64,
    pub name: Option<String>,
    pub head_sha: String,
    pub head_branch: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub run_number: Option<u64>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookWorkflowJob {
    pub id: u64,
    pub run_id: u64,
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

/// Commit entry of a push payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPushCommit {
    pub id: String,
    pub message: String,
    pub timestamp: Option<String>,
    pub author: Option<WebhookGitActor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookGitActor {
    pub name: Option<String>,
    pub username: Option<String>,
}

// ============================================================================
// Event envelopes
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct IssuesEvent {
    pub action: String,
    pub issue: WebhookIssue,
    pub repository: WebhookRepository,
    pub sender: Option<WebhookUser>,
    pub installation: Option<WebhookInstallationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentEvent {
    pub action: String,
    pub issue: WebhookIssue,
    pub comment: WebhookComment,
    pub repository: WebhookRepository,
    pub sender: Option<WebhookUser>,
    pub installation: Option<WebhookInstallationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: WebhookPull,
    pub repository: WebhookRepository,
    pub sender: Option<WebhookUser>,
    pub installation: Option<WebhookInstallationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestReviewEvent {
    pub action: String,
    pub review: WebhookReview,
    pub pull_request: WebhookPull,
    pub repository: WebhookRepository,
    pub sender: Option<WebhookUser>,
    pub installation: Option<WebhookInstallationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestReviewCommentEvent {
    pub action: String,
    pub comment: WebhookReviewComment,
    pub pull_request: WebhookPull,
    pub repository: WebhookRepository,
    pub sender: Option<WebhookUser>,
    pub installation: Option<WebhookInstallationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub before: Option<String>,
    pub after: Option<String>,
    #[serde(default)]
    pub created: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub forced: bool,
    #[serde(default)]
    pub commits: Vec<WebhookPushCommit>,
    pub head_commit: Option<WebhookPushCommit>,
    pub repository: WebhookRepository,
    pub sender: Option<WebhookUser>,
    pub installation: Option<WebhookInstallationRef>,
}

impl PushEvent {
    /// Branch name when the push targets a branch ref.
    pub fn branch_name(&self) -> Option<&str> {
        self.ref_name.strip_prefix("refs/heads/")
    }
}

/// `create` / `delete` events (ref_type selects branch vs tag).
#[derive(Debug, Clone, Deserialize)]
pub struct RefEvent {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub ref_type: String,
    pub repository: WebhookRepository,
    pub sender: Option<WebhookUser>,
    pub installation: Option<WebhookInstallationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRunEvent {
    pub action: String,
    pub check_run: WebhookCheckRun,
    pub repository: WebhookRepository,
    pub sender: Option<WebhookUser>,
    pub installation: Option<WebhookInstallationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunEvent {
    pub action: Option<String>,
    pub workflow_run: WebhookWorkflowRun,
    pub repository: WebhookRepository,
    pub installation: Option<WebhookInstallationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowJobEvent {
    pub action: Option<String>,
    pub workflow_job: WebhookWorkflowJob,
    pub repository: WebhookRepository,
    pub installation: Option<WebhookInstallationRef>,
}

/// `installation` / `installation_repositories` events.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallationEvent {
    pub action: String,
    pub installation: WebhookInstallation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookInstallation {
    pub id: u64,
    pub account: WebhookUser,
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
