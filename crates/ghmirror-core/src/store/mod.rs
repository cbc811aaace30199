//! The document-store contract.
//!
//! Everything the pipeline requires from its store, expressed as one trait:
//! atomic single-row mutations, conditional state transitions, the
//! secondary-index queries behind each read, aggregate counts in O(log n),
//! and cursor pagination. Each method is one "transaction": implementations
//! guarantee the method body observes and mutates a consistent snapshot.
//!
//! Write-write races on the same key are resolved inside the store: domain
//! upserts embed the out-of-order guard (max `github_updated_at` wins) and
//! the optimistic-state merge, so applying two racing writes in either
//! order converges.

use crate::model::*;
use crate::{CorrelationId, DeliveryId, InstallationId, JobId, RepositoryId, Timestamp, UserId};
use async_trait::async_trait;
use ghmirror_store::{Cursor, Page, StoreError};

pub mod memory;

pub use memory::MemoryStore;

/// Result of a guarded domain upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The write was applied (insert or update).
    Applied,
    /// The incoming row was strictly older than the stored one; skipped.
    StaleSkipped,
}

/// Result of creating a sync job under lock-key dedup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateJobOutcome {
    Created,
    /// A job with the same lock key is already pending/running/retrying.
    DuplicateIntent,
}

/// Result of atomically claiming a pending job against the per-installation
/// cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    /// The installation already has `cap` running jobs; job stays pending.
    CapReached,
    /// The job is not in `pending` (already claimed, finished, or unknown).
    NotPending,
}

/// Result of a doc-id-keyed update that may collide with a webhook-created
/// row on its natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocWriteOutcome {
    Updated,
    /// The natural key already belonged to another row; the optimistic
    /// block was adopted into it (confirmed) and the stub was deleted.
    AdoptedExisting { doc_id: String },
}

/// Aggregate-backed projection counters for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepoCounts {
    pub open_pr_count: u64,
    pub open_issue_count: u64,
    pub failing_check_count: u64,
}

/// Progress patch for a running sync job. `items_fetched` is absolute so a
/// resumed workflow that replays journaled chunks reports the same total.
#[derive(Debug, Clone, Default)]
pub struct JobProgress {
    pub current_step: Option<String>,
    pub completed_steps: Option<Vec<String>>,
    pub items_fetched: Option<u64>,
    pub clear_last_error: bool,
}

/// The store trait the whole pipeline programs against.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // ------------------------------------------------------------------
    // Installations, users, repositories
    // ------------------------------------------------------------------

    async fn upsert_installation(&self, installation: Installation) -> Result<(), StoreError>;
    async fn get_installation(
        &self,
        id: InstallationId,
    ) -> Result<Option<Installation>, StoreError>;

    async fn upsert_user(&self, user: User) -> Result<(), StoreError>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError>;

    async fn upsert_repository(&self, repository: Repository) -> Result<(), StoreError>;
    async fn get_repository(&self, id: RepositoryId) -> Result<Option<Repository>, StoreError>;
    async fn get_repository_by_full_name(
        &self,
        full_name: &str,
    ) -> Result<Option<Repository>, StoreError>;

    // ------------------------------------------------------------------
    // Raw events
    // ------------------------------------------------------------------

    /// Insert unless the delivery id exists. Returns `false` on the
    /// idempotent duplicate.
    async fn insert_raw_event(&self, event: RawEvent) -> Result<bool, StoreError>;

    async fn get_raw_event(&self, id: &DeliveryId) -> Result<Option<RawEvent>, StoreError>;

    /// Conditional state transition: applied only when the current state is
    /// in `expected`. Returns whether the update was applied. This is how
    /// two concurrent attempts on one row converge.
    async fn transition_raw_event(
        &self,
        id: &DeliveryId,
        expected: &[ProcessState],
        to: ProcessState,
        error: Option<String>,
        attempts: u32,
        next_retry_at: Option<Timestamp>,
    ) -> Result<bool, StoreError>;

    /// Rows in `retry` whose `next_retry_at` has passed.
    async fn due_retry_events(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<RawEvent>, StoreError>;

    /// Rows in `failed` received before `cutoff` (dead-letter candidates).
    async fn failed_events_before(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> Result<Vec<RawEvent>, StoreError>;

    async fn list_raw_events_by_state(
        &self,
        state: ProcessState,
        limit: usize,
    ) -> Result<Vec<RawEvent>, StoreError>;

    /// Aggregate-backed count by state.
    async fn count_raw_events_by_state(&self, state: ProcessState) -> Result<u64, StoreError>;

    async fn delete_raw_event(&self, id: &DeliveryId) -> Result<bool, StoreError>;

    // ------------------------------------------------------------------
    // Dead letters
    // ------------------------------------------------------------------

    async fn insert_dead_letter(&self, letter: DeadLetter) -> Result<(), StoreError>;
    async fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, StoreError>;

    // ------------------------------------------------------------------
    // Sync jobs
    // ------------------------------------------------------------------

    /// Insert under lock-key dedup: at most one job per lock key may hold
    /// the lock (pending/running/retry).
    async fn create_sync_job(&self, job: SyncJob) -> Result<CreateJobOutcome, StoreError>;

    async fn get_sync_job(&self, id: JobId) -> Result<Option<SyncJob>, StoreError>;
    async fn find_sync_job_by_lock_key(
        &self,
        lock_key: &LockKey,
    ) -> Result<Option<SyncJob>, StoreError>;

    /// Atomically transition `pending → running`, checking the
    /// per-installation running count against `cap` in the same
    /// transaction.
    async fn claim_sync_job(
        &self,
        id: JobId,
        cap: u32,
        now: Timestamp,
    ) -> Result<ClaimOutcome, StoreError>;

    async fn update_sync_job_progress(
        &self,
        id: JobId,
        progress: JobProgress,
        now: Timestamp,
    ) -> Result<(), StoreError>;

    /// Terminal transition to `done` or `failed`, releasing the lock key.
    async fn complete_sync_job(
        &self,
        id: JobId,
        state: JobState,
        error: Option<String>,
        now: Timestamp,
    ) -> Result<(), StoreError>;

    async fn running_job_count(
        &self,
        installation_id: Option<InstallationId>,
    ) -> Result<u64, StoreError>;

    /// Oldest pending jobs for an installation, ordered by
    /// `(priority_sort_key, created_at)`.
    async fn next_pending_jobs(
        &self,
        installation_id: Option<InstallationId>,
        limit: usize,
    ) -> Result<Vec<SyncJob>, StoreError>;

    // ------------------------------------------------------------------
    // Branches & commits
    // ------------------------------------------------------------------

    async fn upsert_branch(&self, branch: Branch) -> Result<(), StoreError>;
    async fn get_branch(
        &self,
        repository_id: RepositoryId,
        name: &str,
    ) -> Result<Option<Branch>, StoreError>;
    /// No-op returning `false` when the branch is already absent.
    async fn delete_branch(
        &self,
        repository_id: RepositoryId,
        name: &str,
    ) -> Result<bool, StoreError>;

    async fn upsert_commits(&self, commits: Vec<Commit>) -> Result<(), StoreError>;
    async fn get_commit(
        &self,
        repository_id: RepositoryId,
        sha: &str,
    ) -> Result<Option<Commit>, StoreError>;

    // ------------------------------------------------------------------
    // Pull requests
    // ------------------------------------------------------------------

    /// Guarded upsert by `(repository, number)`.
    async fn upsert_pull_request(
        &self,
        pull: PullRequest,
        now: Timestamp,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn get_pull_request(
        &self,
        repository_id: RepositoryId,
        number: u64,
    ) -> Result<Option<PullRequest>, StoreError>;

    async fn list_open_pull_requests(
        &self,
        repository_id: RepositoryId,
    ) -> Result<Vec<PullRequest>, StoreError>;

    /// Replace the file set, keyed by head SHA identity: a call with the
    /// already-stored `head_sha` is skipped.
    async fn replace_pull_request_files(
        &self,
        repository_id: RepositoryId,
        number: u64,
        head_sha: &str,
        files: Vec<PullRequestFile>,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn list_pull_request_files(
        &self,
        repository_id: RepositoryId,
        number: u64,
    ) -> Result<Vec<PullRequestFile>, StoreError>;

    // ------------------------------------------------------------------
    // Issues & comments
    // ------------------------------------------------------------------

    /// Plain insert of a new row (optimistic stubs start here).
    async fn insert_issue(&self, issue: Issue) -> Result<(), StoreError>;

    /// Doc-id-keyed update. When the update sets a `(repo, number)` that
    /// already belongs to a webhook-created row, the optimistic block is
    /// adopted into that row (confirmed) and the stub is removed.
    async fn update_issue(
        &self,
        issue: Issue,
        now: Timestamp,
    ) -> Result<DocWriteOutcome, StoreError>;

    /// Guarded upsert by `(repository, number)`; webhook/bootstrap path.
    async fn upsert_issue(&self, issue: Issue, now: Timestamp)
        -> Result<UpsertOutcome, StoreError>;

    async fn get_issue(
        &self,
        repository_id: RepositoryId,
        number: u64,
    ) -> Result<Option<Issue>, StoreError>;

    async fn get_issue_by_doc_id(&self, doc_id: &str) -> Result<Option<Issue>, StoreError>;

    async fn insert_issue_comment(&self, comment: IssueComment) -> Result<(), StoreError>;

    async fn update_issue_comment(
        &self,
        comment: IssueComment,
        now: Timestamp,
    ) -> Result<DocWriteOutcome, StoreError>;

    /// Guarded upsert by `(repository, github comment id)`.
    async fn upsert_issue_comment(
        &self,
        comment: IssueComment,
        now: Timestamp,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn get_issue_comment(
        &self,
        repository_id: RepositoryId,
        github_comment_id: u64,
    ) -> Result<Option<IssueComment>, StoreError>;

    async fn delete_issue_comment(
        &self,
        repository_id: RepositoryId,
        github_comment_id: u64,
    ) -> Result<bool, StoreError>;

    /// Aggregate-backed comment count for one issue.
    async fn count_issue_comments(
        &self,
        repository_id: RepositoryId,
        issue_number: u64,
    ) -> Result<u64, StoreError>;

    // ------------------------------------------------------------------
    // Reviews & review comments
    // ------------------------------------------------------------------

    async fn insert_review(&self, review: PullRequestReview) -> Result<(), StoreError>;

    async fn update_review(
        &self,
        review: PullRequestReview,
        now: Timestamp,
    ) -> Result<DocWriteOutcome, StoreError>;

    /// Guarded upsert by `(repository, github review id)`.
    async fn upsert_review(
        &self,
        review: PullRequestReview,
        now: Timestamp,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn get_review(
        &self,
        repository_id: RepositoryId,
        github_review_id: u64,
    ) -> Result<Option<PullRequestReview>, StoreError>;

    /// Aggregate-backed review count for one pull request.
    async fn count_reviews(
        &self,
        repository_id: RepositoryId,
        pull_request_number: u64,
    ) -> Result<u64, StoreError>;

    async fn upsert_review_comment(
        &self,
        comment: PullRequestReviewComment,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn delete_review_comment(
        &self,
        repository_id: RepositoryId,
        github_comment_id: u64,
    ) -> Result<bool, StoreError>;

    // ------------------------------------------------------------------
    // Checks & workflows
    // ------------------------------------------------------------------

    async fn upsert_check_run(
        &self,
        run: CheckRun,
        now: Timestamp,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn get_check_run(
        &self,
        repository_id: RepositoryId,
        github_check_run_id: u64,
    ) -> Result<Option<CheckRun>, StoreError>;

    async fn upsert_workflow_run(
        &self,
        run: WorkflowRun,
        now: Timestamp,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn upsert_workflow_job(&self, job: WorkflowJob) -> Result<UpsertOutcome, StoreError>;

    /// Aggregate-backed job count for one workflow run.
    async fn count_workflow_jobs(
        &self,
        repository_id: RepositoryId,
        github_run_id: u64,
    ) -> Result<u64, StoreError>;

    // ------------------------------------------------------------------
    // Optimistic write correlation
    // ------------------------------------------------------------------

    /// Record a correlation id. Returns `false` when it was already used —
    /// the duplicate-operation guard.
    async fn register_correlation(&self, id: &CorrelationId) -> Result<bool, StoreError>;

    // ------------------------------------------------------------------
    // Projections & paginated reads
    // ------------------------------------------------------------------

    async fn put_overview(&self, overview: RepoOverview) -> Result<(), StoreError>;
    async fn get_overview(
        &self,
        repository_id: RepositoryId,
    ) -> Result<Option<RepoOverview>, StoreError>;

    async fn append_activity(&self, entry: ActivityEntry) -> Result<(), StoreError>;

    /// The hot projection counters, answered from aggregates.
    async fn repo_counts(&self, repository_id: RepositoryId) -> Result<RepoCounts, StoreError>;

    async fn page_pull_requests(
        &self,
        repository_id: RepositoryId,
        state: Option<PrState>,
        cursor: Cursor,
        num_items: usize,
    ) -> Result<Page<PullRequest>, StoreError>;

    async fn page_issues(
        &self,
        repository_id: RepositoryId,
        state: Option<IssueState>,
        cursor: Cursor,
        num_items: usize,
    ) -> Result<Page<Issue>, StoreError>;

    async fn page_activity(
        &self,
        repository_id: RepositoryId,
        cursor: Cursor,
        num_items: usize,
    ) -> Result<Page<ActivityEntry>, StoreError>;
}
