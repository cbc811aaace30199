//! # gh-mirror GitHub client
//!
//! The REST surface the mirror depends on, split the way the rest of the
//! workspace splits collaborators: a trait ([`GithubApi`]) that core code
//! programs against, and a production implementation ([`RestGithub`]) built
//! on `reqwest`.
//!
//! The trait covers exactly the endpoints the ingestion and bootstrap
//! pipelines use: repository metadata, the paginated `list*` reads, the
//! write endpoints behind optimistic operations, and webhook registration.
//! Anything else GitHub offers is out of scope here.
//!
//! Tokens are resolved per call through [`token::TokenResolver`] and passed
//! in explicitly so that no credential is ever captured by a workflow
//! journal.

use async_trait::async_trait;

pub mod error;
pub mod pagination;
pub mod rest;
pub mod token;
pub mod types;

pub use error::ApiError;
pub use pagination::{next_page_from_link, Paged};
pub use rest::RestGithub;
pub use token::{
    AccessToken, InMemoryTokenResolver, StaticTokenResolver, TokenError, TokenResolver, TokenScope,
};
pub use types::*;

/// GitHub REST operations the mirror core depends on.
///
/// All `list_*` reads request `state=all` where GitHub supports it; the
/// mirror's own store is where state filtering happens.
#[async_trait]
pub trait GithubApi: Send + Sync {
    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    async fn get_repo(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
    ) -> Result<ApiRepo, ApiError>;

    async fn list_branches(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<Paged<ApiBranch>, ApiError>;

    async fn list_pulls(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<Paged<ApiPull>, ApiError>;

    async fn list_issues(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<Paged<ApiIssue>, ApiError>;

    async fn list_commits(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        ref_name: &str,
        page: u32,
    ) -> Result<Paged<ApiCommit>, ApiError>;

    /// Check runs for one commit SHA (not paginated; GitHub caps the set).
    async fn list_check_runs(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        ref_name: &str,
    ) -> Result<Vec<ApiCheckRun>, ApiError>;

    async fn list_workflow_runs(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<Paged<ApiWorkflowRun>, ApiError>;

    async fn list_workflow_jobs(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        run_id: u64,
        page: u32,
    ) -> Result<Paged<ApiWorkflowJob>, ApiError>;

    async fn list_pull_files(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        page: u32,
    ) -> Result<Paged<ApiPullFile>, ApiError>;

    async fn list_pull_reviews(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        page: u32,
    ) -> Result<Paged<ApiReview>, ApiError>;

    async fn list_review_comments(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        page: u32,
    ) -> Result<Paged<ApiReviewComment>, ApiError>;

    async fn list_issue_comments(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        page: u32,
    ) -> Result<Paged<ApiIssueComment>, ApiError>;

    // ------------------------------------------------------------------
    // Writes (optimistic operations)
    // ------------------------------------------------------------------

    async fn create_issue(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        title: &str,
        body: Option<&str>,
    ) -> Result<ApiIssue, ApiError>;

    async fn create_issue_comment(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<ApiIssueComment, ApiError>;

    async fn update_issue_state(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        state: &str,
    ) -> Result<ApiIssue, ApiError>;

    async fn merge_pull(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        method: Option<&str>,
    ) -> Result<ApiMergeResult, ApiError>;

    async fn update_pull_branch(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        expected_head_sha: &str,
    ) -> Result<(), ApiError>;

    async fn submit_review(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        event: &str,
        body: Option<&str>,
    ) -> Result<ApiReview, ApiError>;

    async fn set_labels(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<Vec<ApiLabel>, ApiError>;

    async fn add_assignees(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        assignees: &[String],
    ) -> Result<ApiIssue, ApiError>;

    async fn remove_assignees(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        number: u64,
        assignees: &[String],
    ) -> Result<ApiIssue, ApiError>;

    // ------------------------------------------------------------------
    // Connect-time
    // ------------------------------------------------------------------

    /// Register the mirror's webhook on a repository. Returns the hook id.
    async fn create_hook(
        &self,
        token: &AccessToken,
        owner: &str,
        repo: &str,
        callback_url: &str,
        secret: &str,
    ) -> Result<u64, ApiError>;
}
