//! Response shapes for the GitHub REST endpoints the mirror consumes.
//!
//! Only the fields the ingestion pipeline reads are modelled; unknown fields
//! are ignored by serde. Timestamps stay RFC3339 strings here — conversion
//! to the mirror's epoch-millisecond representation happens in the domain
//! writer, keeping this crate free of the core's types.

use serde::{Deserialize, Serialize};

/// Account (user, bot, or organization) as returned inside other resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiUser {
    pub id: u64,
    pub login: String,
    pub avatar_url: Option<String>,
    #[serde(rename = "type", default)]
    pub user_type: Option<String>,
}

/// Repository metadata from `GET /repos/{owner}/{repo}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRepo {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner: ApiUser,
    #[serde(default)]
    pub private: bool,
    pub default_branch: Option<String>,
    pub visibility: Option<String>,
    pub stargazers_count: Option<u64>,
    pub updated_at: Option<String>,
}

/// Branch row from `GET /repos/{owner}/{repo}/branches`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiBranch {
    pub name: String,
    pub commit: ApiBranchCommit,
    #[serde(default)]
    pub protected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiBranchCommit {
    pub sha: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiLabel {
    pub name: String,
}

/// Head/base ref of a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPullRef {
    pub sha: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
}

/// Pull request from `GET /repos/{owner}/{repo}/pulls?state=all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPull {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub draft: bool,
    pub user: Option<ApiUser>,
    pub head: ApiPullRef,
    pub base: ApiPullRef,
    pub mergeable_state: Option<String>,
    pub merged_at: Option<String>,
    pub closed_at: Option<String>,
    pub updated_at: String,
    #[serde(default)]
    pub labels: Vec<ApiLabel>,
}

/// Issue from `GET /repos/{owner}/{repo}/issues?state=all`.
///
/// GitHub includes pull requests in the issues listing; `pull_request`
/// presence is the discriminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiIssue {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub user: Option<ApiUser>,
    #[serde(default)]
    pub labels: Vec<ApiLabel>,
    #[serde(default)]
    pub assignees: Vec<ApiUser>,
    pub pull_request: Option<serde_json::Value>,
    pub created_at: Option<String>,
    pub updated_at: String,
    pub closed_at: Option<String>,
}

/// Commit from `GET /repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCommit {
    pub sha: String,
    pub commit: ApiCommitDetail,
    pub author: Option<ApiUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCommitDetail {
    pub message: String,
    pub author: Option<ApiGitActor>,
    pub committer: Option<ApiGitActor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiGitActor {
    pub name: Option<String>,
    pub email: Option<String>,
    pub date: Option<String>,
}

/// Check run from `GET /repos/{owner}/{repo}/commits/{ref}/check-runs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCheckRun {
    pub id: u64,
    pub name: Option<String>,
    pub head_sha: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCheckRunList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub check_runs: Vec<ApiCheckRun>,
}

/// Workflow run from `GET /repos/{owner}/{repo}/actions/runs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiWorkflowRun {
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
pub struct ApiWorkflowRunList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub workflow_runs: Vec<ApiWorkflowRun>,
}

/// Workflow job from `GET /repos/{owner}/{repo}/actions/runs/{id}/jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiWorkflowJob {
    pub id: u64,
    pub run_id: u64,
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiWorkflowJobList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub jobs: Vec<ApiWorkflowJob>,
}

/// Review from `GET /repos/{owner}/{repo}/pulls/{n}/reviews`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiReview {
    pub id: u64,
    pub user: Option<ApiUser>,
    pub state: String,
    pub body: Option<String>,
    pub submitted_at: Option<String>,
    pub commit_id: Option<String>,
}

/// Inline review comment from `GET /repos/{owner}/{repo}/pulls/{n}/comments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiReviewComment {
    pub id: u64,
    pub user: Option<ApiUser>,
    pub body: String,
    pub path: String,
    pub line: Option<u64>,
    pub side: Option<String>,
    pub in_reply_to_id: Option<u64>,
    pub commit_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Issue comment from `GET /repos/{owner}/{repo}/issues/{n}/comments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiIssueComment {
    pub id: u64,
    pub user: Option<ApiUser>,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Changed file from `GET /repos/{owner}/{repo}/pulls/{n}/files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPullFile {
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    pub patch: Option<String>,
}

/// Result of `PUT /repos/{owner}/{repo}/pulls/{n}/merge`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMergeResult {
    #[serde(default)]
    pub merged: bool,
    pub sha: Option<String>,
    pub message: Option<String>,
}

/// Hook creation response from `POST /repos/{owner}/{repo}/hooks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHook {
    pub id: u64,
}
