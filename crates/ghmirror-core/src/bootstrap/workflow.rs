//! The bootstrap workflow body: the ordered, durable step graph.

use crate::bootstrap::convert;
use crate::model::*;
use crate::services::Services;
use crate::store::JobProgress;
use crate::{JobId, RepositoryId, Timestamp};
use async_trait::async_trait;
use ghmirror_github::{AccessToken, ApiError, TokenScope};
use ghmirror_store::{ScheduledTask, StoreError};
use ghmirror_workflow::{StepContext, StepError, WorkflowBody, WorkflowError};
use std::time::Duration;
use tracing::{info, warn};

/// SHA chunk size for the check-run analysis step.
const CHECK_RUN_SHA_CHUNK: usize = 100;

/// Store writes per batch for bulk inserts.
const WRITE_BATCH: usize = 50;

fn store_step(err: StoreError) -> StepError {
    StepError {
        message: err.to_string(),
        retryable: err.is_transient(),
    }
}

fn api_step(err: ApiError) -> StepError {
    StepError {
        message: err.to_string(),
        retryable: err.is_transient(),
    }
}

/// One repository's hydration, executed through the workflow engine.
///
/// Steps run in declared order; chunked steps embed their index in the step
/// name so each chunk journals independently. Tokens are resolved inside
/// step bodies and never appear in journaled results.
pub struct BootstrapWorkflow {
    services: Services,
    job_id: JobId,
    repository_id: RepositoryId,
}

impl BootstrapWorkflow {
    pub fn new(services: Services, job_id: JobId, repository_id: RepositoryId) -> Self {
        Self {
            services,
            job_id,
            repository_id,
        }
    }

    fn now(&self) -> Timestamp {
        self.services.now()
    }

    async fn token_for(&self, repo: &Repository) -> Result<AccessToken, StepError> {
        let scope = TokenScope {
            installation_id: repo.installation_id.map(|i| i.as_u64()),
            connected_by_user_id: repo.connected_by_user_id.map(|u| u.as_u64()),
        };
        self.services.tokens.resolve(&scope).await.map_err(|err| {
            warn!(repository_id = %self.repository_id, error = %err, "bootstrap has no token source");
            StepError::permanent(format!("token resolution failed: {}", err))
        })
    }

    /// Record one failed item and move on; the workflow proceeds.
    async fn dead_letter_item(&self, kind: &str, detail: String, reason: String) {
        let letter = DeadLetter {
            delivery_id: DeadLetter::bootstrap_delivery_id(kind, self.repository_id, &detail),
            reason,
            payload_json: "{}".to_string(),
            created_at: self.now(),
            source: DeadLetterSource::Bootstrap,
        };
        if let Err(err) = self.services.store.insert_dead_letter(letter).await {
            warn!(kind, detail = %detail, error = %err, "failed to record bootstrap dead letter");
        }
    }

    async fn note_progress(&self, steps: &StepContext, current: &str, items: Option<u64>) {
        let progress = JobProgress {
            current_step: Some(current.to_string()),
            completed_steps: Some(steps.completed_steps()),
            items_fetched: items,
            clear_last_error: false,
        };
        if let Err(err) = self
            .services
            .store
            .update_sync_job_progress(self.job_id, progress, self.now())
            .await
        {
            warn!(job_id = %self.job_id, error = %err, "failed to update job progress");
        }
    }

    async fn upsert_api_user(&self, user: Option<&ghmirror_github::ApiUser>) {
        if let Some(user) = user {
            if let Err(err) = self
                .services
                .store
                .upsert_user(convert::user_row(user, self.now()))
                .await
            {
                warn!(user = %user.login, error = %err, "user upsert failed during bootstrap");
            }
        }
    }

    // ------------------------------------------------------------------
    // Step bodies
    // ------------------------------------------------------------------

    async fn fetch_branches(&self, repo: &Repository) -> Result<u64, StepError> {
        let token = self.token_for(repo).await?;
        let mut page = Some(1u32);
        let mut count = 0u64;
        while let Some(current) = page {
            let batch = self
                .services
                .github
                .list_branches(&token, &repo.owner_login, &repo.name, current)
                .await
                .map_err(api_step)?;
            for branch in &batch.items {
                let row = convert::branch_row(self.repository_id, branch, self.now());
                match self.services.store.upsert_branch(row).await {
                    Ok(()) => count += 1,
                    Err(err) => {
                        self.dead_letter_item(
                            "branches",
                            branch.name.clone(),
                            err.to_string(),
                        )
                        .await;
                    }
                }
            }
            page = batch.next_page;
        }
        Ok(count)
    }

    /// One durable PR chunk: up to `bootstrap_chunk_pages` REST pages from
    /// `start_page`. Returns `(items written, next page)`.
    async fn fetch_pull_chunk(
        &self,
        repo: &Repository,
        start_page: u32,
    ) -> Result<(u64, Option<u32>), StepError> {
        let token = self.token_for(repo).await?;
        let mut page = Some(start_page);
        let mut pages_done = 0u32;
        let mut count = 0u64;
        while let Some(current) = page {
            let batch = self
                .services
                .github
                .list_pulls(&token, &repo.owner_login, &repo.name, current)
                .await
                .map_err(api_step)?;
            for pull in &batch.items {
                self.upsert_api_user(pull.user.as_ref()).await;
                let write = match convert::pull_row(self.repository_id, pull, self.now()) {
                    Ok(row) => self
                        .services
                        .store
                        .upsert_pull_request(row, self.now())
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string()),
                    Err(err) => Err(err.to_string()),
                };
                match write {
                    Ok(()) => count += 1,
                    Err(reason) => {
                        self.dead_letter_item("pulls", format!("pr-{}", pull.number), reason)
                            .await;
                    }
                }
            }
            pages_done += 1;
            page = batch.next_page;
            if pages_done >= self.services.config.bootstrap_chunk_pages {
                break;
            }
        }
        Ok((count, page))
    }

    async fn fetch_issue_chunk(
        &self,
        repo: &Repository,
        start_page: u32,
    ) -> Result<(u64, Option<u32>), StepError> {
        let token = self.token_for(repo).await?;
        let mut page = Some(start_page);
        let mut pages_done = 0u32;
        let mut count = 0u64;
        while let Some(current) = page {
            let batch = self
                .services
                .github
                .list_issues(&token, &repo.owner_login, &repo.name, current)
                .await
                .map_err(api_step)?;
            for issue in &batch.items {
                self.upsert_api_user(issue.user.as_ref()).await;
                for assignee in &issue.assignees {
                    self.upsert_api_user(Some(assignee)).await;
                }
                let write = match convert::issue_row(self.repository_id, issue, self.now()) {
                    Ok(row) => self
                        .services
                        .store
                        .upsert_issue(row, self.now())
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string()),
                    Err(err) => Err(err.to_string()),
                };
                match write {
                    Ok(()) => count += 1,
                    Err(reason) => {
                        self.dead_letter_item("issues", format!("issue-{}", issue.number), reason)
                            .await;
                    }
                }
            }
            pages_done += 1;
            page = batch.next_page;
            if pages_done >= self.services.config.bootstrap_chunk_pages {
                break;
            }
        }
        Ok((count, page))
    }

    async fn fetch_commits(&self, repo: &Repository) -> Result<u64, StepError> {
        let token = self.token_for(repo).await?;
        let limit = self.services.config.bootstrap_commit_limit as usize;
        let mut rows = Vec::new();
        let mut page = Some(1u32);
        while let Some(current) = page {
            let batch = self
                .services
                .github
                .list_commits(
                    &token,
                    &repo.owner_login,
                    &repo.name,
                    &repo.default_branch,
                    current,
                )
                .await
                .map_err(api_step)?;
            for commit in &batch.items {
                match convert::commit_row(self.repository_id, commit) {
                    Ok(row) => rows.push(row),
                    Err(err) => {
                        self.dead_letter_item("commits", commit.sha.clone(), err.to_string())
                            .await;
                    }
                }
                if rows.len() >= limit {
                    break;
                }
            }
            if rows.len() >= limit {
                break;
            }
            page = batch.next_page;
        }
        let count = rows.len() as u64;
        for batch in rows.chunks(WRITE_BATCH) {
            self.services
                .store
                .upsert_commits(batch.to_vec())
                .await
                .map_err(store_step)?;
        }
        Ok(count)
    }

    /// Unique head SHAs of the open PRs already written by the PR chunks.
    async fn open_pr_head_shas(&self) -> Result<Vec<String>, StepError> {
        let open = self
            .services
            .store
            .list_open_pull_requests(self.repository_id)
            .await
            .map_err(store_step)?;
        let mut shas: Vec<String> = open.into_iter().map(|p| p.head_sha).collect();
        shas.sort();
        shas.dedup();
        Ok(shas)
    }

    async fn fetch_check_runs(
        &self,
        repo: &Repository,
        shas: &[String],
    ) -> Result<u64, StepError> {
        let token = self.token_for(repo).await?;
        let mut count = 0u64;
        for sha in shas {
            let runs = self
                .services
                .github
                .list_check_runs(&token, &repo.owner_login, &repo.name, sha)
                .await
                .map_err(api_step)?;
            for run in &runs {
                let write = match convert::check_run_row(self.repository_id, run) {
                    Ok(row) => self
                        .services
                        .store
                        .upsert_check_run(row, self.now())
                        .await
                        .map(|_| ())
                        .map_err(|e| e.to_string()),
                    Err(err) => Err(err.to_string()),
                };
                match write {
                    Ok(()) => count += 1,
                    Err(reason) => {
                        self.dead_letter_item("check-runs", format!("check-{}", run.id), reason)
                            .await;
                    }
                }
            }
        }
        Ok(count)
    }

    async fn fetch_workflow_runs(&self, repo: &Repository) -> Result<u64, StepError> {
        let token = self.token_for(repo).await?;
        let mut page = Some(1u32);
        let mut pages_done = 0u32;
        let mut count = 0u64;
        while let Some(current) = page {
            let batch = self
                .services
                .github
                .list_workflow_runs(&token, &repo.owner_login, &repo.name, current)
                .await
                .map_err(api_step)?;
            for run in &batch.items {
                let row = convert::workflow_run_row(self.repository_id, run)
                    .map_err(|e| StepError::permanent(e.to_string()))?;
                self.services
                    .store
                    .upsert_workflow_run(row, self.now())
                    .await
                    .map_err(store_step)?;
                count += 1;

                let jobs = self
                    .services
                    .github
                    .list_workflow_jobs(&token, &repo.owner_login, &repo.name, run.id, 1)
                    .await
                    .map_err(api_step)?;
                for job in &jobs.items {
                    let write = match convert::workflow_job_row(self.repository_id, job) {
                        Ok(row) => self
                            .services
                            .store
                            .upsert_workflow_job(row)
                            .await
                            .map(|_| ())
                            .map_err(|e| e.to_string()),
                        Err(err) => Err(err.to_string()),
                    };
                    if let Err(reason) = write {
                        self.dead_letter_item(
                            "workflow-jobs",
                            format!("job-{}", job.id),
                            reason,
                        )
                        .await;
                    }
                }
            }
            pages_done += 1;
            page = batch.next_page;
            if pages_done >= self.services.config.bootstrap_chunk_pages {
                break;
            }
        }
        Ok(count)
    }

    /// Queue one file-diff sync per open PR; the actual fetch runs outside
    /// the workflow.
    async fn schedule_file_syncs(&self) -> Result<u64, StepError> {
        let open = self
            .services
            .store
            .list_open_pull_requests(self.repository_id)
            .await
            .map_err(store_step)?;
        let count = open.len() as u64;
        for pull in open {
            self.services
                .scheduler
                .run_after(
                    Duration::ZERO,
                    ScheduledTask::SyncPullRequestFiles {
                        repository_id: self.repository_id.as_u64(),
                        pull_number: pull.number,
                    },
                )
                .await
                .map_err(|e| StepError::transient(format!("scheduler rejected task: {}", e)))?;
        }
        Ok(count)
    }
}

#[async_trait]
impl WorkflowBody for BootstrapWorkflow {
    async fn run(&self, steps: StepContext) -> Result<(), WorkflowError> {
        let job_id = self.job_id;
        let store = self.services.store.clone();
        let mark_now = self.now();

        let _: u64 = steps
            .run_step("mark-running", || async {
                store
                    .update_sync_job_progress(
                        job_id,
                        JobProgress {
                            current_step: Some("mark-running".to_string()),
                            completed_steps: None,
                            items_fetched: None,
                            clear_last_error: true,
                        },
                        mark_now,
                    )
                    .await
                    .map_err(store_step)?;
                Ok(0u64)
            })
            .await?;

        let repo: Repository = steps
            .run_step("load-repository", || async {
                self.services
                    .store
                    .get_repository(self.repository_id)
                    .await
                    .map_err(store_step)?
                    .ok_or_else(|| {
                        StepError::permanent(format!(
                            "repository {} not found in store",
                            self.repository_id
                        ))
                    })
            })
            .await?;

        let mut total_items: u64 = 0;

        let branches: u64 = steps
            .run_step("fetch-branches", || self.fetch_branches(&repo))
            .await?;
        total_items += branches;
        self.note_progress(&steps, "fetch-branches", Some(total_items))
            .await;

        // Pull requests: chunked cursor loop, one durable step per chunk.
        let mut page = 1u32;
        let mut chunk = 0u32;
        loop {
            let step_name = format!("fetch-pulls-chunk-{}", chunk);
            let start_page = page;
            let (count, next): (u64, Option<u32>) = steps
                .run_step(&step_name, || self.fetch_pull_chunk(&repo, start_page))
                .await?;
            total_items += count;
            chunk += 1;
            if chunk % 5 == 0 {
                self.note_progress(&steps, &step_name, Some(total_items)).await;
            }
            match next {
                Some(next_page) => page = next_page,
                None => break,
            }
        }
        self.note_progress(&steps, "fetch-pulls", Some(total_items)).await;

        // Issues: identical chunked pattern.
        let mut page = 1u32;
        let mut chunk = 0u32;
        loop {
            let step_name = format!("fetch-issues-chunk-{}", chunk);
            let start_page = page;
            let (count, next): (u64, Option<u32>) = steps
                .run_step(&step_name, || self.fetch_issue_chunk(&repo, start_page))
                .await?;
            total_items += count;
            chunk += 1;
            if chunk % 5 == 0 {
                self.note_progress(&steps, &step_name, Some(total_items)).await;
            }
            match next {
                Some(next_page) => page = next_page,
                None => break,
            }
        }
        self.note_progress(&steps, "fetch-issues", Some(total_items)).await;

        let commits: u64 = steps
            .run_step("fetch-commits", || self.fetch_commits(&repo))
            .await?;
        total_items += commits;
        self.note_progress(&steps, "fetch-commits", Some(total_items))
            .await;

        // Check runs for the head SHAs of open PRs (step 3's output).
        let shas: Vec<String> = steps
            .run_step("analyze-check-runs", || self.open_pr_head_shas())
            .await?;
        for (index, sha_chunk) in shas.chunks(CHECK_RUN_SHA_CHUNK).enumerate() {
            let step_name = format!("check-runs-chunk-{}", index);
            let count: u64 = steps
                .run_step(&step_name, || self.fetch_check_runs(&repo, sha_chunk))
                .await?;
            total_items += count;
        }
        self.note_progress(&steps, "check-runs", Some(total_items)).await;

        let runs: u64 = steps
            .run_step("fetch-workflow-runs", || self.fetch_workflow_runs(&repo))
            .await?;
        total_items += runs;
        self.note_progress(&steps, "fetch-workflow-runs", Some(total_items))
            .await;

        let scheduled: u64 = steps
            .run_step("schedule-file-syncs", || self.schedule_file_syncs())
            .await?;

        self.note_progress(&steps, "finalize", Some(total_items)).await;
        info!(
            job_id = %self.job_id,
            repository_id = %self.repository_id,
            items = total_items,
            file_syncs = scheduled,
            "bootstrap workflow finished"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
