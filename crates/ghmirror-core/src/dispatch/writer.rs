//! Domain writer: payload-to-row mapping and the shared upsert plumbing.
//!
//! Every handler funnels through here so the rules live in one place:
//! users are upserted by numeric id before anything links to them, unknown
//! repositories are auto-discovered as stubs with a reconcile job, and
//! timestamps are converted to epoch milliseconds at this boundary.

use crate::events::*;
use crate::model::*;
use crate::services::Services;
use crate::{InstallationId, MirrorError, MirrorResult, RepositoryId, Timestamp, UserId};
use ghmirror_store::ScheduledTask;
use std::time::Duration;
use tracing::{debug, info};

pub(crate) fn parse_ts(value: &str) -> MirrorResult<Timestamp> {
    Timestamp::from_rfc3339(value).map_err(|_| MirrorError::MalformedPayload {
        message: format!("invalid timestamp '{}'", value),
    })
}

pub(crate) fn parse_opt_ts(value: Option<&String>) -> MirrorResult<Option<Timestamp>> {
    value.map(|v| parse_ts(v)).transpose()
}

/// Shared write-side helper used by the dispatcher and bootstrap.
#[derive(Clone)]
pub struct DomainWriter {
    services: Services,
}

impl DomainWriter {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    pub fn now(&self) -> Timestamp {
        self.services.now()
    }

    /// Upsert the referenced account and return its id.
    pub async fn ensure_user(&self, user: Option<&WebhookUser>) -> MirrorResult<Option<UserId>> {
        let Some(user) = user else {
            return Ok(None);
        };
        let user_id = UserId::new(user.id);
        self.services
            .store
            .upsert_user(User {
                user_id,
                login: user.login.clone(),
                avatar_url: user.avatar_url.clone(),
                user_type: UserType::from_api(user.user_type.as_deref()),
                cached_at: self.services.now(),
            })
            .await?;
        Ok(Some(user_id))
    }

    pub async fn ensure_users(&self, users: &[WebhookUser]) -> MirrorResult<Vec<UserId>> {
        let mut ids = Vec::with_capacity(users.len());
        for user in users {
            if let Some(id) = self.ensure_user(Some(user)).await? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Resolve the repository a payload refers to, creating a stub plus a
    /// reconcile job when the mirror has never seen it (auto-discovery).
    pub async fn ensure_repository(
        &self,
        repo: &WebhookRepository,
        installation: Option<InstallationId>,
    ) -> MirrorResult<RepositoryId> {
        let repository_id = RepositoryId::new(repo.id);
        self.ensure_user(Some(&repo.owner)).await?;
        let now = self.services.now();
        let github_updated_at = parse_opt_ts(repo.updated_at.as_ref())?;

        match self.services.store.get_repository(repository_id).await? {
            Some(existing) => {
                let merged = Repository {
                    repository_id,
                    installation_id: installation.or(existing.installation_id),
                    owner_login: repo.owner.login.clone(),
                    name: repo.name.clone(),
                    full_name: repo.full_name.clone(),
                    default_branch: repo
                        .default_branch
                        .clone()
                        .unwrap_or(existing.default_branch),
                    private: repo.private,
                    visibility: Visibility::from_api(repo.visibility.as_deref(), repo.private),
                    connected_by_user_id: existing.connected_by_user_id,
                    stargazers_count: repo.stargazers_count.or(existing.stargazers_count),
                    cached_at: now,
                    github_updated_at: github_updated_at.max(existing.github_updated_at),
                };
                self.services.store.upsert_repository(merged).await?;
            }
            None => {
                info!(%repository_id, full_name = %repo.full_name, "auto-discovered repository");
                let mut stub = Repository::stub(
                    repository_id,
                    installation,
                    repo.owner.login.clone(),
                    repo.name.clone(),
                    repo.full_name.clone(),
                    now,
                );
                if let Some(default_branch) = &repo.default_branch {
                    stub.default_branch = default_branch.clone();
                }
                stub.private = repo.private;
                stub.visibility = Visibility::from_api(repo.visibility.as_deref(), repo.private);
                stub.stargazers_count = repo.stargazers_count;
                stub.github_updated_at = github_updated_at;
                self.services.store.upsert_repository(stub).await?;
                self.enqueue_reconcile(installation, repository_id, "auto-discovered via webhook")
                    .await?;
            }
        }
        Ok(repository_id)
    }

    /// Create a reconcile job for a repository and nudge the drain so the
    /// gate picks it up when there is head-room.
    pub async fn enqueue_reconcile(
        &self,
        installation: Option<InstallationId>,
        repository_id: RepositoryId,
        reason: &str,
    ) -> MirrorResult<()> {
        let job = SyncJob::for_repository(
            JobType::Reconcile,
            reason,
            installation,
            repository_id,
            0,
            self.services.now(),
        );
        match self.services.store.create_sync_job(job).await? {
            crate::store::CreateJobOutcome::Created => {
                self.services
                    .scheduler
                    .run_after(
                        Duration::ZERO,
                        ScheduledTask::DrainInstallation {
                            installation_id: installation.map(|i| i.as_u64()),
                        },
                    )
                    .await
                    .ok();
            }
            crate::store::CreateJobOutcome::DuplicateIntent => {
                debug!(%repository_id, "reconcile already queued");
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Payload → row mapping
    // ------------------------------------------------------------------

    pub fn issue_row(
        &self,
        repository_id: RepositoryId,
        issue: &WebhookIssue,
        author: Option<UserId>,
        assignees: Vec<UserId>,
    ) -> MirrorResult<Issue> {
        Ok(Issue {
            doc_id: new_doc_id(),
            repository_id,
            number: Some(issue.number),
            github_issue_id: Some(issue.id),
            state: IssueState::from_api(&issue.state),
            title: issue.title.clone(),
            body: issue.body.clone(),
            author_user_id: author,
            author_login: issue.user.as_ref().map(|u| u.login.clone()),
            label_names: issue.labels.iter().map(|l| l.name.clone()).collect(),
            assignee_user_ids: assignees,
            is_pull_request: issue.pull_request.is_some(),
            created_at: parse_opt_ts(issue.created_at.as_ref())?.unwrap_or_else(|| self.now()),
            closed_at: parse_opt_ts(issue.closed_at.as_ref())?,
            github_updated_at: Some(parse_ts(&issue.updated_at)?),
            optimistic: None,
        })
    }

    pub fn pull_row(
        &self,
        repository_id: RepositoryId,
        pull: &WebhookPull,
        author: Option<UserId>,
    ) -> MirrorResult<PullRequest> {
        Ok(PullRequest {
            repository_id,
            number: pull.number,
            github_pr_id: pull.id,
            title: pull.title.clone(),
            state: PrState::from_api(&pull.state),
            draft: pull.draft,
            author_user_id: author,
            author_login: pull.user.as_ref().map(|u| u.login.clone()),
            head_sha: pull.head.sha.clone(),
            head_ref_name: pull.head.ref_name.clone(),
            base_ref_name: pull.base.ref_name.clone(),
            mergeable_state: pull.mergeable_state.clone(),
            merged_at: parse_opt_ts(pull.merged_at.as_ref())?,
            closed_at: parse_opt_ts(pull.closed_at.as_ref())?,
            created_at: parse_opt_ts(pull.created_at.as_ref())?.unwrap_or_else(|| self.now()),
            github_updated_at: Some(parse_ts(&pull.updated_at)?),
            optimistic: None,
        })
    }

    pub fn issue_comment_row(
        &self,
        repository_id: RepositoryId,
        issue_number: u64,
        comment: &WebhookComment,
        author: Option<UserId>,
    ) -> MirrorResult<IssueComment> {
        Ok(IssueComment {
            doc_id: new_doc_id(),
            repository_id,
            issue_number,
            github_comment_id: Some(comment.id),
            author_user_id: author,
            author_login: comment.user.as_ref().map(|u| u.login.clone()),
            body: comment.body.clone(),
            created_at: parse_ts(&comment.created_at)?,
            updated_at: parse_ts(&comment.updated_at)?,
            optimistic: None,
        })
    }

    pub fn review_row(
        &self,
        repository_id: RepositoryId,
        pull_request_number: u64,
        review: &WebhookReview,
        author: Option<UserId>,
    ) -> MirrorResult<PullRequestReview> {
        Ok(PullRequestReview {
            doc_id: new_doc_id(),
            repository_id,
            pull_request_number,
            github_review_id: Some(review.id),
            author_user_id: author,
            author_login: review.user.as_ref().map(|u| u.login.clone()),
            state: review.state.clone(),
            body: review.body.clone(),
            submitted_at: parse_opt_ts(review.submitted_at.as_ref())?,
            commit_sha: review.commit_id.clone(),
            optimistic: None,
        })
    }

    pub fn review_comment_row(
        &self,
        repository_id: RepositoryId,
        pull_request_number: u64,
        comment: &WebhookReviewComment,
        author: Option<UserId>,
    ) -> MirrorResult<PullRequestReviewComment> {
        Ok(PullRequestReviewComment {
            repository_id,
            pull_request_number,
            github_comment_id: comment.id,
            author_user_id: author,
            author_login: comment.user.as_ref().map(|u| u.login.clone()),
            body: comment.body.clone(),
            path: comment.path.clone(),
            line: comment.line,
            side: comment.side.clone(),
            in_reply_to_github_review_comment_id: comment.in_reply_to_id,
            commit_sha: comment.commit_id.clone(),
            created_at: parse_ts(&comment.created_at)?,
            updated_at: parse_ts(&comment.updated_at)?,
        })
    }

    pub fn check_run_row(
        &self,
        repository_id: RepositoryId,
        check: &WebhookCheckRun,
    ) -> MirrorResult<CheckRun> {
        let started_at = parse_opt_ts(check.started_at.as_ref())?;
        let completed_at = parse_opt_ts(check.completed_at.as_ref())?;
        Ok(CheckRun {
            repository_id,
            github_check_run_id: check.id,
            name: check.name.clone(),
            head_sha: check.head_sha.clone(),
            status: check.status.clone(),
            conclusion: check.conclusion.clone(),
            started_at,
            completed_at,
            github_updated_at: completed_at.max(started_at),
        })
    }

    pub fn workflow_run_row(
        &self,
        repository_id: RepositoryId,
        run: &WebhookWorkflowRun,
    ) -> MirrorResult<WorkflowRun> {
        Ok(WorkflowRun {
            repository_id,
            github_run_id: run.id,
            workflow_name: run.name.clone(),
            head_sha: run.head_sha.clone(),
            head_branch: run.head_branch.clone(),
            status: run.status.clone(),
            conclusion: run.conclusion.clone(),
            run_number: run.run_number,
            github_updated_at: parse_opt_ts(run.updated_at.as_ref())?,
        })
    }

    pub fn workflow_job_row(
        &self,
        repository_id: RepositoryId,
        job: &WebhookWorkflowJob,
    ) -> MirrorResult<WorkflowJob> {
        Ok(WorkflowJob {
            repository_id,
            github_job_id: job.id,
            github_run_id: job.run_id,
            name: job.name.clone(),
            status: job.status.clone(),
            conclusion: job.conclusion.clone(),
            started_at: parse_opt_ts(job.started_at.as_ref())?,
            completed_at: parse_opt_ts(job.completed_at.as_ref())?,
        })
    }

    pub fn commit_rows(
        &self,
        repository_id: RepositoryId,
        commits: &[WebhookPushCommit],
    ) -> MirrorResult<Vec<Commit>> {
        commits
            .iter()
            .map(|c| {
                Ok(Commit {
                    repository_id,
                    sha: c.id.clone(),
                    message_headline: Commit::headline(&c.message),
                    author_login: c
                        .author
                        .as_ref()
                        .and_then(|a| a.username.clone().or_else(|| a.name.clone())),
                    author_user_id: None,
                    authored_at: parse_opt_ts(c.timestamp.as_ref())?,
                    committed_at: parse_opt_ts(c.timestamp.as_ref())?,
                })
            })
            .collect()
    }

    pub fn services(&self) -> &Services {
        &self.services
    }
}
