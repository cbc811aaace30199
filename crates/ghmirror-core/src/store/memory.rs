//! In-memory [`MetadataStore`] implementation.
//!
//! Fully functional store for tests, development, and single-node
//! deployments: plain tables behind one `RwLock`, explicit secondary-index
//! maps, and [`Aggregate`] trees for the O(log n) counters. Each trait
//! method runs entirely under the lock, which is what makes it one
//! "transaction".

use super::{
    ClaimOutcome, CreateJobOutcome, DocWriteOutcome, JobProgress, MetadataStore, RepoCounts,
    UpsertOutcome,
};
use crate::model::*;
use crate::{CorrelationId, DeliveryId, InstallationId, JobId, RepositoryId, Timestamp, UserId};
use async_trait::async_trait;
use ghmirror_store::{Aggregate, Cursor, Page, StoreError};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::RwLock;

/// Stored file set for one pull request, replaced wholesale by head SHA.
struct PullFileSet {
    head_sha: String,
    files: Vec<PullRequestFile>,
}

fn pr_rank(state: PrState) -> u8 {
    match state {
        PrState::Open => 0,
        PrState::Closed => 1,
    }
}

fn issue_rank(state: IssueState) -> u8 {
    match state {
        IssueState::Open => 0,
        IssueState::Closed => 1,
    }
}

fn job_rank(state: JobState) -> u8 {
    match state {
        JobState::Pending => 0,
        JobState::Running => 1,
        JobState::Retry => 2,
        JobState::Done => 3,
        JobState::Failed => 4,
    }
}

/// Grouping key for the per-installation job aggregate. Jobs without an
/// installation share one pool under the sentinel key.
fn installation_group(installation_id: Option<InstallationId>) -> u64 {
    installation_id.map(|id| id.as_u64()).unwrap_or(u64::MAX)
}

/// The out-of-order guard: an incoming row is stale only when both sides
/// carry an upstream timestamp and the incoming one is strictly older.
fn is_stale(incoming: Option<Timestamp>, stored: Option<Timestamp>) -> bool {
    matches!((incoming, stored), (Some(i), Some(s)) if i < s)
}

fn max_timestamp(a: Option<Timestamp>, b: Option<Timestamp>) -> Option<Timestamp> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[derive(Default)]
struct StoreInner {
    installations: HashMap<u64, Installation>,
    users: HashMap<u64, User>,
    users_by_login: HashMap<String, u64>,
    repositories: HashMap<u64, Repository>,
    repos_by_full_name: HashMap<String, u64>,

    raw_events: HashMap<String, RawEvent>,
    raw_events_by_state: Aggregate<u8>,
    dead_letters: Vec<DeadLetter>,

    sync_jobs: HashMap<JobId, SyncJob>,
    jobs_by_lock_key: HashMap<String, JobId>,
    jobs_by_state: Aggregate<(u64, u8)>,

    branches: HashMap<(u64, String), Branch>,
    commits: HashMap<(u64, String), Commit>,

    pulls: BTreeMap<(u64, u64), PullRequest>,
    pulls_by_state: Aggregate<(u64, u8)>,
    pull_files: HashMap<(u64, u64), PullFileSet>,

    issues: HashMap<String, Issue>,
    issues_by_number: HashMap<(u64, u64), String>,
    issue_order: BTreeMap<(u64, i64, String), String>,
    issues_by_state: Aggregate<(u64, u8)>,

    issue_comments: HashMap<String, IssueComment>,
    comments_by_github_id: HashMap<(u64, u64), String>,
    comments_by_issue: Aggregate<(u64, u64)>,

    reviews: HashMap<String, PullRequestReview>,
    reviews_by_github_id: HashMap<(u64, u64), String>,
    reviews_by_pr: Aggregate<(u64, u64)>,

    review_comments: HashMap<(u64, u64), PullRequestReviewComment>,

    check_runs: HashMap<(u64, u64), CheckRun>,
    checks_by_repo: Aggregate<(u64, u8)>,

    workflow_runs: HashMap<(u64, u64), WorkflowRun>,
    workflow_jobs: HashMap<(u64, u64), WorkflowJob>,
    jobs_by_run: Aggregate<(u64, u64)>,

    activity: BTreeMap<(u64, i64, String), ActivityEntry>,
    overviews: HashMap<u64, RepoOverview>,
    correlations: HashSet<String>,
}

impl StoreInner {
    fn remove_issue_row(&mut self, doc_id: &str) {
        if let Some(issue) = self.issues.remove(doc_id) {
            let repo = issue.repository_id.as_u64();
            if let Some(number) = issue.number {
                if self.issues_by_number.get(&(repo, number)).map(String::as_str) == Some(doc_id) {
                    self.issues_by_number.remove(&(repo, number));
                }
            }
            self.issue_order
                .remove(&(repo, issue.created_at.as_millis(), doc_id.to_string()));
            self.issues_by_state.remove(&(repo, issue_rank(issue.state)));
        }
    }
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().expect("store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().expect("store lock poisoned")
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    // ------------------------------------------------------------------
    // Installations, users, repositories
    // ------------------------------------------------------------------

    async fn upsert_installation(&self, installation: Installation) -> Result<(), StoreError> {
        self.write()
            .installations
            .insert(installation.installation_id.as_u64(), installation);
        Ok(())
    }

    async fn get_installation(
        &self,
        id: InstallationId,
    ) -> Result<Option<Installation>, StoreError> {
        Ok(self.read().installations.get(&id.as_u64()).cloned())
    }

    async fn upsert_user(&self, user: User) -> Result<(), StoreError> {
        let mut inner = self.write();
        // A login can move between accounts; the index tracks the latest.
        if let Some(existing) = inner.users.get(&user.user_id.as_u64()) {
            if existing.login != user.login {
                let stale_login = existing.login.clone();
                inner.users_by_login.remove(&stale_login);
            }
        }
        inner
            .users_by_login
            .insert(user.login.clone(), user.user_id.as_u64());
        inner.users.insert(user.user_id.as_u64(), user);
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read().users.get(&id.as_u64()).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let inner = self.read();
        Ok(inner
            .users_by_login
            .get(login)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn upsert_repository(&self, repository: Repository) -> Result<(), StoreError> {
        let mut inner = self.write();
        let id = repository.repository_id.as_u64();
        if let Some(existing) = inner.repositories.get(&id) {
            if existing.full_name != repository.full_name {
                let stale = existing.full_name.clone();
                inner.repos_by_full_name.remove(&stale);
            }
        }
        inner
            .repos_by_full_name
            .insert(repository.full_name.clone(), id);
        inner.repositories.insert(id, repository);
        Ok(())
    }

    async fn get_repository(&self, id: RepositoryId) -> Result<Option<Repository>, StoreError> {
        Ok(self.read().repositories.get(&id.as_u64()).cloned())
    }

    async fn get_repository_by_full_name(
        &self,
        full_name: &str,
    ) -> Result<Option<Repository>, StoreError> {
        let inner = self.read();
        Ok(inner
            .repos_by_full_name
            .get(full_name)
            .and_then(|id| inner.repositories.get(id))
            .cloned())
    }

    // ------------------------------------------------------------------
    // Raw events
    // ------------------------------------------------------------------

    async fn insert_raw_event(&self, event: RawEvent) -> Result<bool, StoreError> {
        let mut inner = self.write();
        let key = event.delivery_id.as_str().to_string();
        if inner.raw_events.contains_key(&key) {
            return Ok(false);
        }
        inner.raw_events_by_state.insert(event.process_state.rank());
        inner.raw_events.insert(key, event);
        Ok(true)
    }

    async fn get_raw_event(&self, id: &DeliveryId) -> Result<Option<RawEvent>, StoreError> {
        Ok(self.read().raw_events.get(id.as_str()).cloned())
    }

    async fn transition_raw_event(
        &self,
        id: &DeliveryId,
        expected: &[ProcessState],
        to: ProcessState,
        error: Option<String>,
        attempts: u32,
        next_retry_at: Option<Timestamp>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.write();
        let Some(event) = inner.raw_events.get_mut(id.as_str()) else {
            return Ok(false);
        };
        if !expected.contains(&event.process_state) {
            return Ok(false);
        }
        let old_rank = event.process_state.rank();
        event.process_state = to;
        event.process_error = error;
        event.process_attempts = attempts;
        event.next_retry_at = next_retry_at;
        inner.raw_events_by_state.remove(&old_rank);
        inner.raw_events_by_state.insert(to.rank());
        Ok(true)
    }

    async fn due_retry_events(
        &self,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<RawEvent>, StoreError> {
        let inner = self.read();
        let mut due: Vec<RawEvent> = inner
            .raw_events
            .values()
            .filter(|e| {
                e.process_state == ProcessState::Retry
                    && e.next_retry_at.map(|t| t <= now).unwrap_or(true)
            })
            .cloned()
            .collect();
        due.sort_by_key(|e| e.next_retry_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn failed_events_before(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> Result<Vec<RawEvent>, StoreError> {
        let inner = self.read();
        let mut failed: Vec<RawEvent> = inner
            .raw_events
            .values()
            .filter(|e| e.process_state == ProcessState::Failed && e.received_at < cutoff)
            .cloned()
            .collect();
        failed.sort_by_key(|e| e.received_at);
        failed.truncate(limit);
        Ok(failed)
    }

    async fn list_raw_events_by_state(
        &self,
        state: ProcessState,
        limit: usize,
    ) -> Result<Vec<RawEvent>, StoreError> {
        let inner = self.read();
        let mut events: Vec<RawEvent> = inner
            .raw_events
            .values()
            .filter(|e| e.process_state == state)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.received_at);
        events.truncate(limit);
        Ok(events)
    }

    async fn count_raw_events_by_state(&self, state: ProcessState) -> Result<u64, StoreError> {
        let rank = state.rank();
        Ok(self.read().raw_events_by_state.count(rank..=rank))
    }

    async fn delete_raw_event(&self, id: &DeliveryId) -> Result<bool, StoreError> {
        let mut inner = self.write();
        match inner.raw_events.remove(id.as_str()) {
            Some(event) => {
                inner.raw_events_by_state.remove(&event.process_state.rank());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ------------------------------------------------------------------
    // Dead letters
    // ------------------------------------------------------------------

    async fn insert_dead_letter(&self, letter: DeadLetter) -> Result<(), StoreError> {
        self.write().dead_letters.push(letter);
        Ok(())
    }

    async fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, StoreError> {
        let inner = self.read();
        let mut letters = inner.dead_letters.clone();
        letters.sort_by_key(|l| l.created_at);
        letters.truncate(limit);
        Ok(letters)
    }

    // ------------------------------------------------------------------
    // Sync jobs
    // ------------------------------------------------------------------

    async fn create_sync_job(&self, job: SyncJob) -> Result<CreateJobOutcome, StoreError> {
        let mut inner = self.write();
        let lock_key = job.lock_key.as_str().to_string();
        if let Some(existing_id) = inner.jobs_by_lock_key.get(&lock_key) {
            if let Some(existing) = inner.sync_jobs.get(existing_id) {
                if existing.state.holds_lock() {
                    return Ok(CreateJobOutcome::DuplicateIntent);
                }
            }
        }
        let group = installation_group(job.installation_id);
        inner.jobs_by_state.insert((group, job_rank(job.state)));
        inner.jobs_by_lock_key.insert(lock_key, job.job_id);
        inner.sync_jobs.insert(job.job_id, job);
        Ok(CreateJobOutcome::Created)
    }

    async fn get_sync_job(&self, id: JobId) -> Result<Option<SyncJob>, StoreError> {
        Ok(self.read().sync_jobs.get(&id).cloned())
    }

    async fn find_sync_job_by_lock_key(
        &self,
        lock_key: &LockKey,
    ) -> Result<Option<SyncJob>, StoreError> {
        let inner = self.read();
        Ok(inner
            .jobs_by_lock_key
            .get(lock_key.as_str())
            .and_then(|id| inner.sync_jobs.get(id))
            .cloned())
    }

    async fn claim_sync_job(
        &self,
        id: JobId,
        cap: u32,
        now: Timestamp,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut inner = self.write();
        let Some(job) = inner.sync_jobs.get(&id).cloned() else {
            return Ok(ClaimOutcome::NotPending);
        };
        if job.state != JobState::Pending {
            return Ok(ClaimOutcome::NotPending);
        }
        let group = installation_group(job.installation_id);
        let running_rank = job_rank(JobState::Running);
        let running = inner
            .jobs_by_state
            .count((group, running_rank)..=(group, running_rank));
        if running >= cap as u64 {
            return Ok(ClaimOutcome::CapReached);
        }
        if let Some(job) = inner.sync_jobs.get_mut(&id) {
            job.state = JobState::Running;
            job.attempt_count += 1;
            job.updated_at = now;
        }
        inner
            .jobs_by_state
            .remove(&(group, job_rank(JobState::Pending)));
        inner.jobs_by_state.insert((group, running_rank));
        Ok(ClaimOutcome::Claimed)
    }

    async fn update_sync_job_progress(
        &self,
        id: JobId,
        progress: JobProgress,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        let Some(job) = inner.sync_jobs.get_mut(&id) else {
            return Err(StoreError::not_found("sync_job", id));
        };
        if let Some(step) = progress.current_step {
            job.current_step = Some(step);
        }
        if let Some(steps) = progress.completed_steps {
            job.completed_steps = steps;
        }
        if let Some(items) = progress.items_fetched {
            job.items_fetched = items;
        }
        if progress.clear_last_error {
            job.last_error = None;
        }
        job.updated_at = now;
        Ok(())
    }

    async fn complete_sync_job(
        &self,
        id: JobId,
        state: JobState,
        error: Option<String>,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        let Some(job) = inner.sync_jobs.get_mut(&id) else {
            return Err(StoreError::not_found("sync_job", id));
        };
        let group = installation_group(job.installation_id);
        let old_rank = job_rank(job.state);
        job.state = state;
        job.last_error = error;
        job.current_step = None;
        job.updated_at = now;
        let lock_key = job.lock_key.as_str().to_string();
        inner.jobs_by_state.remove(&(group, old_rank));
        inner.jobs_by_state.insert((group, job_rank(state)));
        if state.is_terminal() {
            if inner.jobs_by_lock_key.get(&lock_key) == Some(&id) {
                inner.jobs_by_lock_key.remove(&lock_key);
            }
        }
        Ok(())
    }

    async fn running_job_count(
        &self,
        installation_id: Option<InstallationId>,
    ) -> Result<u64, StoreError> {
        let group = installation_group(installation_id);
        let rank = job_rank(JobState::Running);
        Ok(self.read().jobs_by_state.count((group, rank)..=(group, rank)))
    }

    async fn next_pending_jobs(
        &self,
        installation_id: Option<InstallationId>,
        limit: usize,
    ) -> Result<Vec<SyncJob>, StoreError> {
        let inner = self.read();
        let mut pending: Vec<SyncJob> = inner
            .sync_jobs
            .values()
            .filter(|j| {
                j.state == JobState::Pending && j.installation_id == installation_id
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            (a.priority_sort_key, a.created_at, a.job_id.to_string())
                .cmp(&(b.priority_sort_key, b.created_at, b.job_id.to_string()))
        });
        pending.truncate(limit);
        Ok(pending)
    }

    // ------------------------------------------------------------------
    // Branches & commits
    // ------------------------------------------------------------------

    async fn upsert_branch(&self, branch: Branch) -> Result<(), StoreError> {
        self.write().branches.insert(
            (branch.repository_id.as_u64(), branch.name.clone()),
            branch,
        );
        Ok(())
    }

    async fn get_branch(
        &self,
        repository_id: RepositoryId,
        name: &str,
    ) -> Result<Option<Branch>, StoreError> {
        Ok(self
            .read()
            .branches
            .get(&(repository_id.as_u64(), name.to_string()))
            .cloned())
    }

    async fn delete_branch(
        &self,
        repository_id: RepositoryId,
        name: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .write()
            .branches
            .remove(&(repository_id.as_u64(), name.to_string()))
            .is_some())
    }

    async fn upsert_commits(&self, commits: Vec<Commit>) -> Result<(), StoreError> {
        let mut inner = self.write();
        for commit in commits {
            inner
                .commits
                .insert((commit.repository_id.as_u64(), commit.sha.clone()), commit);
        }
        Ok(())
    }

    async fn get_commit(
        &self,
        repository_id: RepositoryId,
        sha: &str,
    ) -> Result<Option<Commit>, StoreError> {
        Ok(self
            .read()
            .commits
            .get(&(repository_id.as_u64(), sha.to_string()))
            .cloned())
    }

    // ------------------------------------------------------------------
    // Pull requests
    // ------------------------------------------------------------------

    async fn upsert_pull_request(
        &self,
        pull: PullRequest,
        now: Timestamp,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut inner = self.write();
        let repo = pull.repository_id.as_u64();
        let key = (repo, pull.number);
        match inner.pulls.get(&key).cloned() {
            Some(stored) => {
                if is_stale(pull.github_updated_at, stored.github_updated_at) {
                    return Ok(UpsertOutcome::StaleSkipped);
                }
                let mut merged = pull;
                merged.created_at = stored.created_at;
                merged.github_updated_at =
                    max_timestamp(merged.github_updated_at, stored.github_updated_at);
                merged.optimistic =
                    OptimisticMeta::merge(stored.optimistic.as_ref(), merged.optimistic, now);
                inner.pulls_by_state.remove(&(repo, pr_rank(stored.state)));
                inner.pulls_by_state.insert((repo, pr_rank(merged.state)));
                inner.pulls.insert(key, merged);
            }
            None => {
                inner.pulls_by_state.insert((repo, pr_rank(pull.state)));
                inner.pulls.insert(key, pull);
            }
        }
        Ok(UpsertOutcome::Applied)
    }

    async fn get_pull_request(
        &self,
        repository_id: RepositoryId,
        number: u64,
    ) -> Result<Option<PullRequest>, StoreError> {
        Ok(self
            .read()
            .pulls
            .get(&(repository_id.as_u64(), number))
            .cloned())
    }

    async fn list_open_pull_requests(
        &self,
        repository_id: RepositoryId,
    ) -> Result<Vec<PullRequest>, StoreError> {
        let repo = repository_id.as_u64();
        Ok(self
            .read()
            .pulls
            .range((repo, 0)..=(repo, u64::MAX))
            .filter(|(_, p)| p.state == PrState::Open)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn replace_pull_request_files(
        &self,
        repository_id: RepositoryId,
        number: u64,
        head_sha: &str,
        files: Vec<PullRequestFile>,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut inner = self.write();
        let key = (repository_id.as_u64(), number);
        if let Some(existing) = inner.pull_files.get(&key) {
            if existing.head_sha == head_sha {
                return Ok(UpsertOutcome::StaleSkipped);
            }
        }
        inner.pull_files.insert(
            key,
            PullFileSet {
                head_sha: head_sha.to_string(),
                files,
            },
        );
        Ok(UpsertOutcome::Applied)
    }

    async fn list_pull_request_files(
        &self,
        repository_id: RepositoryId,
        number: u64,
    ) -> Result<Vec<PullRequestFile>, StoreError> {
        Ok(self
            .read()
            .pull_files
            .get(&(repository_id.as_u64(), number))
            .map(|set| set.files.clone())
            .unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Issues & comments
    // ------------------------------------------------------------------

    async fn insert_issue(&self, issue: Issue) -> Result<(), StoreError> {
        let mut inner = self.write();
        let repo = issue.repository_id.as_u64();
        if let Some(number) = issue.number {
            if inner.issues_by_number.contains_key(&(repo, number)) {
                return Err(StoreError::conflict(format!(
                    "issue {}#{} already exists",
                    repo, number
                )));
            }
            inner
                .issues_by_number
                .insert((repo, number), issue.doc_id.clone());
        }
        inner.issue_order.insert(
            (repo, issue.created_at.as_millis(), issue.doc_id.clone()),
            issue.doc_id.clone(),
        );
        inner.issues_by_state.insert((repo, issue_rank(issue.state)));
        inner.issues.insert(issue.doc_id.clone(), issue);
        Ok(())
    }

    async fn update_issue(
        &self,
        issue: Issue,
        now: Timestamp,
    ) -> Result<DocWriteOutcome, StoreError> {
        let mut inner = self.write();
        let doc_id = issue.doc_id.clone();
        let Some(stored) = inner.issues.get(&doc_id).cloned() else {
            return Err(StoreError::not_found("issue", &doc_id));
        };
        let repo = issue.repository_id.as_u64();

        // Setting a number that a webhook-created row already owns means the
        // confirming event beat the accept path: adopt into that row.
        if let Some(number) = issue.number {
            let existing_doc = inner.issues_by_number.get(&(repo, number)).cloned();
            if let Some(existing_doc) = existing_doc {
                if existing_doc != doc_id {
                    if let Some(mut existing) = inner.issues.get(&existing_doc).cloned() {
                        existing.optimistic = issue
                            .optimistic
                            .map(|meta| meta.confirmed(now))
                            .or(existing.optimistic);
                        if existing.github_issue_id.is_none() {
                            existing.github_issue_id = issue.github_issue_id;
                        }
                        inner.issues.insert(existing_doc.clone(), existing);
                    }
                    inner.remove_issue_row(&doc_id);
                    return Ok(DocWriteOutcome::AdoptedExisting {
                        doc_id: existing_doc,
                    });
                }
            }
        }

        let mut merged = issue;
        merged.created_at = stored.created_at;
        let incoming_meta = merged.optimistic.take();
        merged.optimistic = OptimisticMeta::merge(stored.optimistic.as_ref(), incoming_meta, now);
        if stored.number != merged.number {
            if let Some(old_number) = stored.number {
                if inner.issues_by_number.get(&(repo, old_number)).map(String::as_str)
                    == Some(doc_id.as_str())
                {
                    inner.issues_by_number.remove(&(repo, old_number));
                }
            }
            if let Some(new_number) = merged.number {
                inner
                    .issues_by_number
                    .insert((repo, new_number), doc_id.clone());
            }
        }
        if stored.state != merged.state {
            inner.issues_by_state.remove(&(repo, issue_rank(stored.state)));
            inner.issues_by_state.insert((repo, issue_rank(merged.state)));
        }
        inner.issues.insert(doc_id, merged);
        Ok(DocWriteOutcome::Updated)
    }

    async fn upsert_issue(
        &self,
        issue: Issue,
        now: Timestamp,
    ) -> Result<UpsertOutcome, StoreError> {
        let number = issue
            .number
            .ok_or_else(|| StoreError::conflict("issue upsert requires a number"))?;
        let mut inner = self.write();
        let repo = issue.repository_id.as_u64();
        let existing_doc = inner.issues_by_number.get(&(repo, number)).cloned();
        match existing_doc.and_then(|doc| inner.issues.get(&doc).cloned()) {
            Some(stored) => {
                if is_stale(issue.github_updated_at, stored.github_updated_at) {
                    return Ok(UpsertOutcome::StaleSkipped);
                }
                let mut merged = issue;
                merged.doc_id = stored.doc_id.clone();
                merged.created_at = stored.created_at;
                merged.github_updated_at =
                    max_timestamp(merged.github_updated_at, stored.github_updated_at);
                merged.optimistic =
                    OptimisticMeta::merge(stored.optimistic.as_ref(), merged.optimistic, now);
                if stored.state != merged.state {
                    inner.issues_by_state.remove(&(repo, issue_rank(stored.state)));
                    inner.issues_by_state.insert((repo, issue_rank(merged.state)));
                }
                inner.issues.insert(merged.doc_id.clone(), merged);
            }
            None => {
                inner
                    .issues_by_number
                    .insert((repo, number), issue.doc_id.clone());
                inner.issue_order.insert(
                    (repo, issue.created_at.as_millis(), issue.doc_id.clone()),
                    issue.doc_id.clone(),
                );
                inner.issues_by_state.insert((repo, issue_rank(issue.state)));
                inner.issues.insert(issue.doc_id.clone(), issue);
            }
        }
        Ok(UpsertOutcome::Applied)
    }

    async fn get_issue(
        &self,
        repository_id: RepositoryId,
        number: u64,
    ) -> Result<Option<Issue>, StoreError> {
        let inner = self.read();
        Ok(inner
            .issues_by_number
            .get(&(repository_id.as_u64(), number))
            .and_then(|doc| inner.issues.get(doc))
            .cloned())
    }

    async fn get_issue_by_doc_id(&self, doc_id: &str) -> Result<Option<Issue>, StoreError> {
        Ok(self.read().issues.get(doc_id).cloned())
    }

    async fn insert_issue_comment(&self, comment: IssueComment) -> Result<(), StoreError> {
        let mut inner = self.write();
        let repo = comment.repository_id.as_u64();
        if let Some(github_id) = comment.github_comment_id {
            inner
                .comments_by_github_id
                .insert((repo, github_id), comment.doc_id.clone());
        }
        inner
            .comments_by_issue
            .insert((repo, comment.issue_number));
        inner.issue_comments.insert(comment.doc_id.clone(), comment);
        Ok(())
    }

    async fn update_issue_comment(
        &self,
        comment: IssueComment,
        now: Timestamp,
    ) -> Result<DocWriteOutcome, StoreError> {
        let mut inner = self.write();
        let doc_id = comment.doc_id.clone();
        let Some(stored) = inner.issue_comments.get(&doc_id).cloned() else {
            return Err(StoreError::not_found("issue_comment", &doc_id));
        };
        let repo = comment.repository_id.as_u64();

        if let Some(github_id) = comment.github_comment_id {
            let existing_doc = inner.comments_by_github_id.get(&(repo, github_id)).cloned();
            if let Some(existing_doc) = existing_doc {
                if existing_doc != doc_id {
                    if let Some(mut existing) = inner.issue_comments.get(&existing_doc).cloned() {
                        existing.optimistic = comment
                            .optimistic
                            .map(|meta| meta.confirmed(now))
                            .or(existing.optimistic);
                        inner.issue_comments.insert(existing_doc.clone(), existing);
                    }
                    inner.issue_comments.remove(&doc_id);
                    inner
                        .comments_by_issue
                        .remove(&(repo, stored.issue_number));
                    return Ok(DocWriteOutcome::AdoptedExisting {
                        doc_id: existing_doc,
                    });
                }
            } else {
                inner
                    .comments_by_github_id
                    .insert((repo, github_id), doc_id.clone());
            }
        }

        let mut merged = comment;
        merged.created_at = stored.created_at;
        let incoming_meta = merged.optimistic.take();
        merged.optimistic = OptimisticMeta::merge(stored.optimistic.as_ref(), incoming_meta, now);
        inner.issue_comments.insert(doc_id, merged);
        Ok(DocWriteOutcome::Updated)
    }

    async fn upsert_issue_comment(
        &self,
        comment: IssueComment,
        now: Timestamp,
    ) -> Result<UpsertOutcome, StoreError> {
        let github_id = comment
            .github_comment_id
            .ok_or_else(|| StoreError::conflict("comment upsert requires a github id"))?;
        let mut inner = self.write();
        let repo = comment.repository_id.as_u64();
        let existing_doc = inner.comments_by_github_id.get(&(repo, github_id)).cloned();
        match existing_doc.and_then(|doc| inner.issue_comments.get(&doc).cloned()) {
            Some(stored) => {
                let mut merged = comment;
                merged.doc_id = stored.doc_id.clone();
                merged.created_at = stored.created_at;
                merged.optimistic =
                    OptimisticMeta::merge(stored.optimistic.as_ref(), merged.optimistic, now);
                inner.issue_comments.insert(merged.doc_id.clone(), merged);
            }
            None => {
                inner
                    .comments_by_github_id
                    .insert((repo, github_id), comment.doc_id.clone());
                inner
                    .comments_by_issue
                    .insert((repo, comment.issue_number));
                inner.issue_comments.insert(comment.doc_id.clone(), comment);
            }
        }
        Ok(UpsertOutcome::Applied)
    }

    async fn get_issue_comment(
        &self,
        repository_id: RepositoryId,
        github_comment_id: u64,
    ) -> Result<Option<IssueComment>, StoreError> {
        let inner = self.read();
        Ok(inner
            .comments_by_github_id
            .get(&(repository_id.as_u64(), github_comment_id))
            .and_then(|doc| inner.issue_comments.get(doc))
            .cloned())
    }

    async fn delete_issue_comment(
        &self,
        repository_id: RepositoryId,
        github_comment_id: u64,
    ) -> Result<bool, StoreError> {
        let mut inner = self.write();
        let repo = repository_id.as_u64();
        let Some(doc_id) = inner.comments_by_github_id.remove(&(repo, github_comment_id)) else {
            return Ok(false);
        };
        if let Some(comment) = inner.issue_comments.remove(&doc_id) {
            inner
                .comments_by_issue
                .remove(&(repo, comment.issue_number));
        }
        Ok(true)
    }

    async fn count_issue_comments(
        &self,
        repository_id: RepositoryId,
        issue_number: u64,
    ) -> Result<u64, StoreError> {
        let key = (repository_id.as_u64(), issue_number);
        Ok(self.read().comments_by_issue.count(key..=key))
    }

    // ------------------------------------------------------------------
    // Reviews & review comments
    // ------------------------------------------------------------------

    async fn insert_review(&self, review: PullRequestReview) -> Result<(), StoreError> {
        let mut inner = self.write();
        let repo = review.repository_id.as_u64();
        if let Some(github_id) = review.github_review_id {
            inner
                .reviews_by_github_id
                .insert((repo, github_id), review.doc_id.clone());
        }
        inner
            .reviews_by_pr
            .insert((repo, review.pull_request_number));
        inner.reviews.insert(review.doc_id.clone(), review);
        Ok(())
    }

    async fn update_review(
        &self,
        review: PullRequestReview,
        now: Timestamp,
    ) -> Result<DocWriteOutcome, StoreError> {
        let mut inner = self.write();
        let doc_id = review.doc_id.clone();
        let Some(stored) = inner.reviews.get(&doc_id).cloned() else {
            return Err(StoreError::not_found("review", &doc_id));
        };
        let repo = review.repository_id.as_u64();

        if let Some(github_id) = review.github_review_id {
            let existing_doc = inner.reviews_by_github_id.get(&(repo, github_id)).cloned();
            if let Some(existing_doc) = existing_doc {
                if existing_doc != doc_id {
                    if let Some(mut existing) = inner.reviews.get(&existing_doc).cloned() {
                        existing.optimistic = review
                            .optimistic
                            .map(|meta| meta.confirmed(now))
                            .or(existing.optimistic);
                        inner.reviews.insert(existing_doc.clone(), existing);
                    }
                    inner.reviews.remove(&doc_id);
                    inner
                        .reviews_by_pr
                        .remove(&(repo, stored.pull_request_number));
                    return Ok(DocWriteOutcome::AdoptedExisting {
                        doc_id: existing_doc,
                    });
                }
            } else {
                inner
                    .reviews_by_github_id
                    .insert((repo, github_id), doc_id.clone());
            }
        }

        let mut merged = review;
        let incoming_meta = merged.optimistic.take();
        merged.optimistic = OptimisticMeta::merge(stored.optimistic.as_ref(), incoming_meta, now);
        inner.reviews.insert(doc_id, merged);
        Ok(DocWriteOutcome::Updated)
    }

    async fn upsert_review(
        &self,
        review: PullRequestReview,
        now: Timestamp,
    ) -> Result<UpsertOutcome, StoreError> {
        let github_id = review
            .github_review_id
            .ok_or_else(|| StoreError::conflict("review upsert requires a github id"))?;
        let mut inner = self.write();
        let repo = review.repository_id.as_u64();
        let existing_doc = inner.reviews_by_github_id.get(&(repo, github_id)).cloned();
        match existing_doc.and_then(|doc| inner.reviews.get(&doc).cloned()) {
            Some(stored) => {
                let mut merged = review;
                merged.doc_id = stored.doc_id.clone();
                merged.optimistic =
                    OptimisticMeta::merge(stored.optimistic.as_ref(), merged.optimistic, now);
                inner.reviews.insert(merged.doc_id.clone(), merged);
            }
            None => {
                inner
                    .reviews_by_github_id
                    .insert((repo, github_id), review.doc_id.clone());
                inner
                    .reviews_by_pr
                    .insert((repo, review.pull_request_number));
                inner.reviews.insert(review.doc_id.clone(), review);
            }
        }
        Ok(UpsertOutcome::Applied)
    }

    async fn get_review(
        &self,
        repository_id: RepositoryId,
        github_review_id: u64,
    ) -> Result<Option<PullRequestReview>, StoreError> {
        let inner = self.read();
        Ok(inner
            .reviews_by_github_id
            .get(&(repository_id.as_u64(), github_review_id))
            .and_then(|doc| inner.reviews.get(doc))
            .cloned())
    }

    async fn count_reviews(
        &self,
        repository_id: RepositoryId,
        pull_request_number: u64,
    ) -> Result<u64, StoreError> {
        let key = (repository_id.as_u64(), pull_request_number);
        Ok(self.read().reviews_by_pr.count(key..=key))
    }

    async fn upsert_review_comment(
        &self,
        comment: PullRequestReviewComment,
    ) -> Result<UpsertOutcome, StoreError> {
        self.write().review_comments.insert(
            (comment.repository_id.as_u64(), comment.github_comment_id),
            comment,
        );
        Ok(UpsertOutcome::Applied)
    }

    async fn delete_review_comment(
        &self,
        repository_id: RepositoryId,
        github_comment_id: u64,
    ) -> Result<bool, StoreError> {
        Ok(self
            .write()
            .review_comments
            .remove(&(repository_id.as_u64(), github_comment_id))
            .is_some())
    }

    // ------------------------------------------------------------------
    // Checks & workflows
    // ------------------------------------------------------------------

    async fn upsert_check_run(
        &self,
        run: CheckRun,
        _now: Timestamp,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut inner = self.write();
        let repo = run.repository_id.as_u64();
        let key = (repo, run.github_check_run_id);
        match inner.check_runs.get(&key).cloned() {
            Some(stored) => {
                if is_stale(run.github_updated_at, stored.github_updated_at) {
                    return Ok(UpsertOutcome::StaleSkipped);
                }
                let mut merged = run;
                merged.github_updated_at =
                    max_timestamp(merged.github_updated_at, stored.github_updated_at);
                inner
                    .checks_by_repo
                    .remove(&(repo, stored.is_failing() as u8));
                inner.checks_by_repo.insert((repo, merged.is_failing() as u8));
                inner.check_runs.insert(key, merged);
            }
            None => {
                inner.checks_by_repo.insert((repo, run.is_failing() as u8));
                inner.check_runs.insert(key, run);
            }
        }
        Ok(UpsertOutcome::Applied)
    }

    async fn get_check_run(
        &self,
        repository_id: RepositoryId,
        github_check_run_id: u64,
    ) -> Result<Option<CheckRun>, StoreError> {
        Ok(self
            .read()
            .check_runs
            .get(&(repository_id.as_u64(), github_check_run_id))
            .cloned())
    }

    async fn upsert_workflow_run(
        &self,
        run: WorkflowRun,
        _now: Timestamp,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut inner = self.write();
        let key = (run.repository_id.as_u64(), run.github_run_id);
        if let Some(stored) = inner.workflow_runs.get(&key) {
            if is_stale(run.github_updated_at, stored.github_updated_at) {
                return Ok(UpsertOutcome::StaleSkipped);
            }
            let mut merged = run;
            merged.github_updated_at =
                max_timestamp(merged.github_updated_at, stored.github_updated_at);
            inner.workflow_runs.insert(key, merged);
        } else {
            inner.workflow_runs.insert(key, run);
        }
        Ok(UpsertOutcome::Applied)
    }

    async fn upsert_workflow_job(&self, job: WorkflowJob) -> Result<UpsertOutcome, StoreError> {
        let mut inner = self.write();
        let repo = job.repository_id.as_u64();
        let key = (repo, job.github_job_id);
        if !inner.workflow_jobs.contains_key(&key) {
            inner.jobs_by_run.insert((repo, job.github_run_id));
        }
        inner.workflow_jobs.insert(key, job);
        Ok(UpsertOutcome::Applied)
    }

    async fn count_workflow_jobs(
        &self,
        repository_id: RepositoryId,
        github_run_id: u64,
    ) -> Result<u64, StoreError> {
        let key = (repository_id.as_u64(), github_run_id);
        Ok(self.read().jobs_by_run.count(key..=key))
    }

    // ------------------------------------------------------------------
    // Optimistic write correlation
    // ------------------------------------------------------------------

    async fn register_correlation(&self, id: &CorrelationId) -> Result<bool, StoreError> {
        Ok(self.write().correlations.insert(id.as_str().to_string()))
    }

    // ------------------------------------------------------------------
    // Projections & paginated reads
    // ------------------------------------------------------------------

    async fn put_overview(&self, overview: RepoOverview) -> Result<(), StoreError> {
        self.write()
            .overviews
            .insert(overview.repository_id.as_u64(), overview);
        Ok(())
    }

    async fn get_overview(
        &self,
        repository_id: RepositoryId,
    ) -> Result<Option<RepoOverview>, StoreError> {
        Ok(self.read().overviews.get(&repository_id.as_u64()).cloned())
    }

    async fn append_activity(&self, entry: ActivityEntry) -> Result<(), StoreError> {
        self.write().activity.insert(
            (
                entry.repository_id.as_u64(),
                entry.created_at.as_millis(),
                entry.activity_id.clone(),
            ),
            entry,
        );
        Ok(())
    }

    async fn repo_counts(&self, repository_id: RepositoryId) -> Result<RepoCounts, StoreError> {
        let inner = self.read();
        let repo = repository_id.as_u64();
        let open_pr = pr_rank(PrState::Open);
        let open_issue = issue_rank(IssueState::Open);
        Ok(RepoCounts {
            open_pr_count: inner.pulls_by_state.count((repo, open_pr)..=(repo, open_pr)),
            open_issue_count: inner
                .issues_by_state
                .count((repo, open_issue)..=(repo, open_issue)),
            failing_check_count: inner.checks_by_repo.count((repo, 1)..=(repo, 1)),
        })
    }

    async fn page_pull_requests(
        &self,
        repository_id: RepositoryId,
        state: Option<PrState>,
        cursor: Cursor,
        num_items: usize,
    ) -> Result<Page<PullRequest>, StoreError> {
        let inner = self.read();
        let repo = repository_id.as_u64();
        let mut rows = Vec::new();
        let mut is_done = true;
        let mut last = cursor.clone();
        for ((_, number), pull) in inner.pulls.range((repo, 0)..=(repo, u64::MAX)) {
            if let Some(filter) = state {
                if pull.state != filter {
                    continue;
                }
            }
            let sort_key = *number as i64;
            if !cursor.admits(sort_key, "") {
                continue;
            }
            if rows.len() == num_items {
                is_done = false;
                break;
            }
            last = Cursor::after(sort_key, "");
            rows.push(pull.clone());
        }
        Ok(Page {
            page: rows,
            is_done,
            continue_cursor: last.encode(),
        })
    }

    async fn page_issues(
        &self,
        repository_id: RepositoryId,
        state: Option<IssueState>,
        cursor: Cursor,
        num_items: usize,
    ) -> Result<Page<Issue>, StoreError> {
        let inner = self.read();
        let repo = repository_id.as_u64();
        let mut rows = Vec::new();
        let mut is_done = true;
        let mut last = cursor.clone();
        let start = Bound::Included((repo, i64::MIN, String::new()));
        for ((row_repo, created_at, doc_id), issue_doc) in
            inner.issue_order.range((start, Bound::Unbounded))
        {
            if *row_repo != repo {
                break;
            }
            let Some(issue) = inner.issues.get(issue_doc) else {
                continue;
            };
            if let Some(filter) = state {
                if issue.state != filter {
                    continue;
                }
            }
            if !cursor.admits(*created_at, doc_id) {
                continue;
            }
            if rows.len() == num_items {
                is_done = false;
                break;
            }
            last = Cursor::after(*created_at, doc_id.clone());
            rows.push(issue.clone());
        }
        Ok(Page {
            page: rows,
            is_done,
            continue_cursor: last.encode(),
        })
    }

    async fn page_activity(
        &self,
        repository_id: RepositoryId,
        cursor: Cursor,
        num_items: usize,
    ) -> Result<Page<ActivityEntry>, StoreError> {
        let inner = self.read();
        let repo = repository_id.as_u64();
        let mut rows = Vec::new();
        let mut is_done = true;
        let mut last = cursor.clone();
        let start = Bound::Included((repo, i64::MIN, String::new()));
        for ((row_repo, created_at, activity_id), entry) in
            inner.activity.range((start, Bound::Unbounded))
        {
            if *row_repo != repo {
                break;
            }
            if !cursor.admits(*created_at, activity_id) {
                continue;
            }
            if rows.len() == num_items {
                is_done = false;
                break;
            }
            last = Cursor::after(*created_at, activity_id.clone());
            rows.push(entry.clone());
        }
        Ok(Page {
            page: rows,
            is_done,
            continue_cursor: last.encode(),
        })
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
