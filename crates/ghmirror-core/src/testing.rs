//! Test doubles shared by unit and integration tests.
//!
//! Compiled under `cfg(test)` and the `test-util` feature so downstream
//! test crates reuse the same fakes instead of re-rolling them.

use crate::config::MirrorConfig;
use crate::services::{ManualClock, Services};
use crate::store::MemoryStore;
use async_trait::async_trait;
use ghmirror_github::*;
use ghmirror_store::ManualScheduler;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// FakeGithub
// ============================================================================

/// Canned-data [`GithubApi`] implementation.
///
/// Lists serve from in-memory vectors with real pagination; writes append
/// to the same vectors so a follow-up list sees them. `reject_writes`
/// simulates GitHub rejecting mutations.
#[derive(Default)]
pub struct FakeGithub {
    pub repo: Mutex<Option<ApiRepo>>,
    pub branches: Mutex<Vec<ApiBranch>>,
    pub pulls: Mutex<Vec<ApiPull>>,
    pub issues: Mutex<Vec<ApiIssue>>,
    pub commits: Mutex<Vec<ApiCommit>>,
    pub check_runs: Mutex<HashMap<String, Vec<ApiCheckRun>>>,
    pub workflow_runs: Mutex<Vec<ApiWorkflowRun>>,
    pub workflow_jobs: Mutex<HashMap<u64, Vec<ApiWorkflowJob>>>,
    pub pull_files: Mutex<HashMap<u64, Vec<ApiPullFile>>>,
    pub pull_reviews: Mutex<HashMap<u64, Vec<ApiReview>>>,
    pub review_comments: Mutex<HashMap<u64, Vec<ApiReviewComment>>>,
    pub issue_comments: Mutex<HashMap<u64, Vec<ApiIssueComment>>>,
    pub next_issue_number: AtomicU64,
    pub next_id: AtomicU64,
    /// When set, every write returns `Rejected { status, message }`.
    pub reject_writes: Mutex<Option<(u16, String)>>,
    /// Page size for list endpoints (small values exercise chunking).
    pub page_size: usize,
    /// Names of calls made, for interaction assertions.
    pub calls: Mutex<Vec<String>>,
}

impl FakeGithub {
    pub fn new() -> Self {
        Self {
            page_size: 100,
            next_issue_number: AtomicU64::new(99),
            next_id: AtomicU64::new(10_000),
            ..Self::default()
        }
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::new()
        }
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls
            .lock()
            .expect("fake lock poisoned")
            .push(call.into());
    }

    pub fn reject_next_writes(&self, status: u16, message: &str) {
        *self.reject_writes.lock().expect("fake lock poisoned") =
            Some((status, message.to_string()));
    }

    fn write_guard(&self) -> Result<(), ApiError> {
        if let Some((status, message)) = self
            .reject_writes
            .lock()
            .expect("fake lock poisoned")
            .clone()
        {
            return Err(ApiError::Rejected { status, message });
        }
        Ok(())
    }

    fn page_of<T: Clone>(&self, items: &[T], page: u32) -> Paged<T> {
        let page = page.max(1);
        let start = ((page - 1) as usize) * self.page_size;
        let slice: Vec<T> = items
            .iter()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .collect();
        let next_page = if start + self.page_size < items.len() {
            Some(page + 1)
        } else {
            None
        };
        Paged {
            items: slice,
            next_page,
        }
    }

    fn fresh_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// Build an [`ApiUser`] quickly.
pub fn api_user(id: u64, login: &str) -> ApiUser {
    ApiUser {
        id,
        login: login.to_string(),
        avatar_url: None,
        user_type: Some("User".to_string()),
    }
}

#[async_trait]
impl GithubApi for FakeGithub {
    async fn get_repo(
        &self,
        _token: &AccessToken,
        owner: &str,
        repo: &str,
    ) -> Result<ApiRepo, ApiError> {
        self.record("get_repo");
        self.repo
            .lock()
            .expect("fake lock poisoned")
            .clone()
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("repos/{}/{}", owner, repo),
            })
    }

    async fn list_branches(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        page: u32,
    ) -> Result<Paged<ApiBranch>, ApiError> {
        self.record("list_branches");
        let branches = self.branches.lock().expect("fake lock poisoned").clone();
        Ok(self.page_of(&branches, page))
    }

    async fn list_pulls(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        page: u32,
    ) -> Result<Paged<ApiPull>, ApiError> {
        self.record("list_pulls");
        let pulls = self.pulls.lock().expect("fake lock poisoned").clone();
        Ok(self.page_of(&pulls, page))
    }

    async fn list_issues(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        page: u32,
    ) -> Result<Paged<ApiIssue>, ApiError> {
        self.record("list_issues");
        let issues = self.issues.lock().expect("fake lock poisoned").clone();
        Ok(self.page_of(&issues, page))
    }

    async fn list_commits(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        _ref_name: &str,
        page: u32,
    ) -> Result<Paged<ApiCommit>, ApiError> {
        self.record("list_commits");
        let commits = self.commits.lock().expect("fake lock poisoned").clone();
        Ok(self.page_of(&commits, page))
    }

    async fn list_check_runs(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        ref_name: &str,
    ) -> Result<Vec<ApiCheckRun>, ApiError> {
        self.record(format!("list_check_runs:{}", ref_name));
        Ok(self
            .check_runs
            .lock()
            .expect("fake lock poisoned")
            .get(ref_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_workflow_runs(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        page: u32,
    ) -> Result<Paged<ApiWorkflowRun>, ApiError> {
        self.record("list_workflow_runs");
        let runs = self.workflow_runs.lock().expect("fake lock poisoned").clone();
        Ok(self.page_of(&runs, page))
    }

    async fn list_workflow_jobs(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        run_id: u64,
        page: u32,
    ) -> Result<Paged<ApiWorkflowJob>, ApiError> {
        self.record("list_workflow_jobs");
        let jobs = self
            .workflow_jobs
            .lock()
            .expect("fake lock poisoned")
            .get(&run_id)
            .cloned()
            .unwrap_or_default();
        Ok(self.page_of(&jobs, page))
    }

    async fn list_pull_files(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        number: u64,
        page: u32,
    ) -> Result<Paged<ApiPullFile>, ApiError> {
        self.record(format!("list_pull_files:{}", number));
        let files = self
            .pull_files
            .lock()
            .expect("fake lock poisoned")
            .get(&number)
            .cloned()
            .unwrap_or_default();
        Ok(self.page_of(&files, page))
    }

    async fn list_pull_reviews(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        number: u64,
        page: u32,
    ) -> Result<Paged<ApiReview>, ApiError> {
        self.record("list_pull_reviews");
        let reviews = self
            .pull_reviews
            .lock()
            .expect("fake lock poisoned")
            .get(&number)
            .cloned()
            .unwrap_or_default();
        Ok(self.page_of(&reviews, page))
    }

    async fn list_review_comments(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        number: u64,
        page: u32,
    ) -> Result<Paged<ApiReviewComment>, ApiError> {
        self.record("list_review_comments");
        let comments = self
            .review_comments
            .lock()
            .expect("fake lock poisoned")
            .get(&number)
            .cloned()
            .unwrap_or_default();
        Ok(self.page_of(&comments, page))
    }

    async fn list_issue_comments(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        number: u64,
        page: u32,
    ) -> Result<Paged<ApiIssueComment>, ApiError> {
        self.record("list_issue_comments");
        let comments = self
            .issue_comments
            .lock()
            .expect("fake lock poisoned")
            .get(&number)
            .cloned()
            .unwrap_or_default();
        Ok(self.page_of(&comments, page))
    }

    async fn create_issue(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        title: &str,
        body: Option<&str>,
    ) -> Result<ApiIssue, ApiError> {
        self.record("create_issue");
        self.write_guard()?;
        let number = self.next_issue_number.fetch_add(1, Ordering::SeqCst);
        let issue = ApiIssue {
            id: self.fresh_id(),
            number,
            title: title.to_string(),
            body: body.map(String::from),
            state: "open".to_string(),
            user: Some(api_user(1001, "u")),
            labels: vec![],
            assignees: vec![],
            pull_request: None,
            created_at: Some("2026-02-18T10:00:00Z".to_string()),
            updated_at: "2026-02-18T10:00:00Z".to_string(),
            closed_at: None,
        };
        self.issues
            .lock()
            .expect("fake lock poisoned")
            .push(issue.clone());
        Ok(issue)
    }

    async fn create_issue_comment(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        number: u64,
        body: &str,
    ) -> Result<ApiIssueComment, ApiError> {
        self.record("create_issue_comment");
        self.write_guard()?;
        let comment = ApiIssueComment {
            id: self.fresh_id(),
            user: Some(api_user(1001, "u")),
            body: body.to_string(),
            created_at: "2026-02-18T10:00:00Z".to_string(),
            updated_at: "2026-02-18T10:00:00Z".to_string(),
        };
        self.issue_comments
            .lock()
            .expect("fake lock poisoned")
            .entry(number)
            .or_default()
            .push(comment.clone());
        Ok(comment)
    }

    async fn update_issue_state(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        number: u64,
        state: &str,
    ) -> Result<ApiIssue, ApiError> {
        self.record("update_issue_state");
        self.write_guard()?;
        let mut issues = self.issues.lock().expect("fake lock poisoned");
        let issue = issues
            .iter_mut()
            .find(|i| i.number == number)
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("issues/{}", number),
            })?;
        issue.state = state.to_string();
        Ok(issue.clone())
    }

    async fn merge_pull(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        _number: u64,
        _method: Option<&str>,
    ) -> Result<ApiMergeResult, ApiError> {
        self.record("merge_pull");
        self.write_guard()?;
        Ok(ApiMergeResult {
            merged: true,
            sha: Some("merge-sha".to_string()),
            message: None,
        })
    }

    async fn update_pull_branch(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        _number: u64,
        _expected_head_sha: &str,
    ) -> Result<(), ApiError> {
        self.record("update_pull_branch");
        self.write_guard()
    }

    async fn submit_review(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        number: u64,
        event: &str,
        body: Option<&str>,
    ) -> Result<ApiReview, ApiError> {
        self.record("submit_review");
        self.write_guard()?;
        let review = ApiReview {
            id: self.fresh_id(),
            user: Some(api_user(1001, "u")),
            state: match event {
                "APPROVE" => "approved".to_string(),
                "REQUEST_CHANGES" => "changes_requested".to_string(),
                _ => "commented".to_string(),
            },
            body: body.map(String::from),
            submitted_at: Some("2026-02-18T10:00:00Z".to_string()),
            commit_id: None,
        };
        self.pull_reviews
            .lock()
            .expect("fake lock poisoned")
            .entry(number)
            .or_default()
            .push(review.clone());
        Ok(review)
    }

    async fn set_labels(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        _number: u64,
        labels: &[String],
    ) -> Result<Vec<ApiLabel>, ApiError> {
        self.record("set_labels");
        self.write_guard()?;
        Ok(labels
            .iter()
            .map(|name| ApiLabel { name: name.clone() })
            .collect())
    }

    async fn add_assignees(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        number: u64,
        _assignees: &[String],
    ) -> Result<ApiIssue, ApiError> {
        self.record("add_assignees");
        self.write_guard()?;
        let issues = self.issues.lock().expect("fake lock poisoned");
        issues
            .iter()
            .find(|i| i.number == number)
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("issues/{}", number),
            })
    }

    async fn remove_assignees(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        number: u64,
        _assignees: &[String],
    ) -> Result<ApiIssue, ApiError> {
        self.record("remove_assignees");
        self.write_guard()?;
        let issues = self.issues.lock().expect("fake lock poisoned");
        issues
            .iter()
            .find(|i| i.number == number)
            .cloned()
            .ok_or_else(|| ApiError::NotFound {
                resource: format!("issues/{}", number),
            })
    }

    async fn create_hook(
        &self,
        _token: &AccessToken,
        _owner: &str,
        _repo: &str,
        _callback_url: &str,
        _secret: &str,
    ) -> Result<u64, ApiError> {
        self.record("create_hook");
        self.write_guard()?;
        Ok(1)
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Everything a pipeline test needs, wired against the in-memory store.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub scheduler: Arc<ManualScheduler>,
    pub github: Arc<FakeGithub>,
    pub clock: Arc<ManualClock>,
    pub services: Services,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: MirrorConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let github = Arc::new(FakeGithub::new());
        let clock = Arc::new(ManualClock::at(1_771_408_800_000)); // 2026-02-18T10:00:00Z
        let services = Services {
            store: store.clone(),
            scheduler: scheduler.clone(),
            github: github.clone(),
            tokens: Arc::new(StaticTokenResolver::new(AccessToken::new("test-token"))),
            clock: clock.clone(),
            config,
        };
        Self {
            store,
            scheduler,
            github,
            clock,
            services,
        }
    }

    /// Run queued `ProcessRawEvent` tasks to completion, including ones
    /// scheduled by the processing itself. Other task kinds are returned
    /// for the test to route.
    pub async fn run_processing(
        &self,
        processor: &crate::ingest::EventProcessor,
    ) -> Vec<ghmirror_store::ScheduledTask> {
        let mut other = Vec::new();
        loop {
            let tasks = self.scheduler.drain();
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                match task {
                    ghmirror_store::ScheduledTask::ProcessRawEvent { delivery_id } => {
                        let id = crate::DeliveryId::new(delivery_id).expect("valid delivery id");
                        processor.process_delivery(&id).await.expect("process");
                    }
                    task => other.push(task),
                }
            }
        }
        other
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Config with small budgets so tests run fast.
pub fn test_config() -> MirrorConfig {
    MirrorConfig {
        bootstrap_commit_limit: 10,
        bootstrap_chunk_pages: 2,
        ..MirrorConfig::default()
    }
}

// ============================================================================
// Webhook payload builders
// ============================================================================

/// JSON payload builders mirroring what GitHub delivers.
pub mod payloads {
    pub fn repository(repo_id: u64) -> serde_json::Value {
        serde_json::json!({
            "id": repo_id,
            "name": "widgets",
            "full_name": "octo/widgets",
            "owner": { "id": 1, "login": "octo", "type": "Organization" },
            "private": false,
            "default_branch": "main"
        })
    }

    pub fn issues_event(
        repo_id: u64,
        action: &str,
        number: u64,
        title: &str,
        state: &str,
        updated_at: &str,
    ) -> String {
        serde_json::json!({
            "action": action,
            "issue": {
                "id": 5000 + number,
                "number": number,
                "state": state,
                "title": title,
                "updated_at": updated_at
            },
            "repository": repository(repo_id),
            "sender": { "id": 1001, "login": "u" }
        })
        .to_string()
    }

    pub fn pull_request_event(
        repo_id: u64,
        action: &str,
        number: u64,
        title: &str,
        state: &str,
        updated_at: &str,
        merged_at: Option<&str>,
    ) -> String {
        serde_json::json!({
            "action": action,
            "pull_request": {
                "id": 900 + number,
                "number": number,
                "title": title,
                "state": state,
                "draft": false,
                "user": { "id": 1001, "login": "u" },
                "head": { "sha": "abc123", "ref": "feature" },
                "base": { "sha": "def456", "ref": "main" },
                "merged_at": merged_at,
                "updated_at": updated_at
            },
            "repository": repository(repo_id),
            "sender": { "id": 1001, "login": "u" }
        })
        .to_string()
    }

    pub fn push_event(repo_id: u64, branch: &str, commit_count: usize) -> String {
        let commits: Vec<serde_json::Value> = (0..commit_count)
            .map(|i| {
                serde_json::json!({
                    "id": format!("sha-{}", i),
                    "message": format!("commit {}", i),
                    "timestamp": "2026-02-18T10:00:00Z",
                    "author": { "name": "U", "username": "u" }
                })
            })
            .collect();
        serde_json::json!({
            "ref": format!("refs/heads/{}", branch),
            "before": "old-sha",
            "after": "new-sha",
            "commits": commits,
            "head_commit": commits.last(),
            "repository": repository(repo_id),
            "sender": { "id": 1001, "login": "u" }
        })
        .to_string()
    }

    pub fn check_run_event(
        repo_id: u64,
        action: &str,
        check_id: u64,
        status: &str,
        conclusion: Option<&str>,
    ) -> String {
        let completed_at = conclusion.map(|_| "2026-02-18T10:05:00Z");
        serde_json::json!({
            "action": action,
            "check_run": {
                "id": check_id,
                "name": "ci",
                "head_sha": "abc123",
                "status": status,
                "conclusion": conclusion,
                "started_at": "2026-02-18T10:00:00Z",
                "completed_at": completed_at
            },
            "repository": repository(repo_id)
        })
        .to_string()
    }

    pub fn issue_comment_event(
        repo_id: u64,
        action: &str,
        issue_number: u64,
        comment_id: u64,
        body: &str,
        on_pull_request: bool,
    ) -> String {
        let mut issue = serde_json::json!({
            "id": 5000 + issue_number,
            "number": issue_number,
            "state": "open",
            "title": "T",
            "updated_at": "2026-02-18T10:00:00Z"
        });
        if on_pull_request {
            issue["pull_request"] =
                serde_json::json!({ "url": "https://api.github.com/pulls/1" });
        }
        serde_json::json!({
            "action": action,
            "issue": issue,
            "comment": {
                "id": comment_id,
                "body": body,
                "user": { "id": 1001, "login": "u" },
                "created_at": "2026-02-18T10:00:00Z",
                "updated_at": "2026-02-18T10:00:00Z"
            },
            "repository": repository(repo_id),
            "sender": { "id": 1001, "login": "u" }
        })
        .to_string()
    }
}
