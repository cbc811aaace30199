//! Event dispatcher: decode one raw event and route by `(event, action)`.
//!
//! Routing is exhaustive over the handled table; anything else is an
//! explicit no-op so the raw row still reaches `processed`. Handlers share
//! the [`DomainWriter`] for user upserts, auto-discovery, and payload
//! mapping, and every write goes through the store's guarded upserts.

use crate::events::*;
use crate::model::*;
use crate::services::Services;
use crate::store::UpsertOutcome;
use crate::{InstallationId, MirrorError, MirrorResult, RepositoryId, Timestamp};
use ghmirror_store::ScheduledTask;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

pub mod writer;

pub use writer::DomainWriter;

/// What a dispatch produced, for the processor's projection step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Domain state may have changed for this repository.
    Handled {
        repository_id: Option<RepositoryId>,
        /// Push handlers report the push time for the overview projection.
        last_push_at: Option<Timestamp>,
    },
    /// Event or action the mirror does not route; no effect.
    Ignored,
}

impl DispatchOutcome {
    fn handled(repository_id: RepositoryId) -> Self {
        Self::Handled {
            repository_id: Some(repository_id),
            last_push_at: None,
        }
    }
}

/// Routes raw events into domain writes.
pub struct Dispatcher {
    services: Services,
    writer: DomainWriter,
}

impl Dispatcher {
    pub fn new(services: Services) -> Self {
        Self {
            writer: DomainWriter::new(services.clone()),
            services,
        }
    }

    fn decode<T: DeserializeOwned>(&self, event: &RawEvent) -> MirrorResult<T> {
        serde_json::from_str(&event.payload_json).map_err(|e| MirrorError::MalformedPayload {
            message: format!(
                "failed to decode {} payload for {}: {}",
                event.event_name, event.delivery_id, e
            ),
        })
    }

    /// Decode and apply one raw event.
    #[instrument(skip(self, event), fields(delivery_id = %event.delivery_id, event = %event.event_name))]
    pub async fn dispatch(&self, event: &RawEvent) -> MirrorResult<DispatchOutcome> {
        let action = event.action.as_deref();
        match (event.event_name.as_str(), action) {
            ("ping", _) => Ok(DispatchOutcome::Ignored),

            (
                "issues",
                Some(
                    "opened" | "edited" | "closed" | "reopened" | "labeled" | "unlabeled"
                    | "assigned" | "unassigned",
                ),
            ) => self.handle_issues(event).await,

            ("issue_comment", Some("created" | "edited" | "deleted")) => {
                self.handle_issue_comment(event).await
            }

            (
                "pull_request",
                Some(
                    "opened" | "edited" | "closed" | "reopened" | "synchronize"
                    | "ready_for_review" | "converted_to_draft",
                ),
            ) => self.handle_pull_request(event).await,

            ("pull_request_review", Some("submitted" | "edited" | "dismissed")) => {
                self.handle_review(event).await
            }

            ("pull_request_review_comment", Some("created" | "edited" | "deleted")) => {
                self.handle_review_comment(event).await
            }

            ("push", _) => self.handle_push(event).await,

            ("create" | "delete", _) => self.handle_ref(event).await,

            ("check_run", Some("created" | "completed")) => self.handle_check_run(event).await,

            ("workflow_run", _) => self.handle_workflow_run(event).await,
            ("workflow_job", _) => self.handle_workflow_job(event).await,

            ("installation" | "installation_repositories", _) => {
                self.handle_installation(event).await
            }

            (name, action) => {
                debug!(event = name, ?action, "unrouted event, marking processed");
                Ok(DispatchOutcome::Ignored)
            }
        }
    }

    fn installation_of(&self, reference: &Option<WebhookInstallationRef>) -> Option<InstallationId> {
        reference.as_ref().map(|r| InstallationId::new(r.id))
    }

    // ------------------------------------------------------------------
    // Issues
    // ------------------------------------------------------------------

    async fn handle_issues(&self, event: &RawEvent) -> MirrorResult<DispatchOutcome> {
        let payload: IssuesEvent = self.decode(event)?;
        let installation = self.installation_of(&payload.installation);
        let repository_id = self
            .writer
            .ensure_repository(&payload.repository, installation)
            .await?;
        let author = self.writer.ensure_user(payload.issue.user.as_ref()).await?;
        let assignees = self.writer.ensure_users(&payload.issue.assignees).await?;
        self.writer.ensure_user(payload.sender.as_ref()).await?;

        let row = self
            .writer
            .issue_row(repository_id, &payload.issue, author, assignees)?;
        let occurred_at = row.github_updated_at.unwrap_or_else(|| self.services.now());
        let outcome = self.services.store.upsert_issue(row, self.services.now()).await?;

        if outcome == UpsertOutcome::Applied {
            let activity_type = match payload.action.as_str() {
                "opened" => Some("issue.opened"),
                "closed" => Some("issue.closed"),
                _ => None,
            };
            if let Some(activity_type) = activity_type {
                self.append_activity(
                    event,
                    repository_id,
                    activity_type,
                    payload.issue.title.clone(),
                    payload.sender.as_ref().map(|s| s.login.clone()),
                    Some(payload.issue.number),
                    occurred_at,
                )
                .await?;
            }
        }
        Ok(DispatchOutcome::handled(repository_id))
    }

    // ------------------------------------------------------------------
    // Issue comments (routes to pr_comment / issue_comment)
    // ------------------------------------------------------------------

    async fn handle_issue_comment(&self, event: &RawEvent) -> MirrorResult<DispatchOutcome> {
        let payload: IssueCommentEvent = self.decode(event)?;
        let installation = self.installation_of(&payload.installation);
        let repository_id = self
            .writer
            .ensure_repository(&payload.repository, installation)
            .await?;

        if payload.action == "deleted" {
            // No-op when the row is already absent.
            self.services
                .store
                .delete_issue_comment(repository_id, payload.comment.id)
                .await?;
            return Ok(DispatchOutcome::handled(repository_id));
        }

        let author = self.writer.ensure_user(payload.comment.user.as_ref()).await?;
        let row = self.writer.issue_comment_row(
            repository_id,
            payload.issue.number,
            &payload.comment,
            author,
        )?;
        let occurred_at = row.updated_at;
        self.services
            .store
            .upsert_issue_comment(row, self.services.now())
            .await?;

        if payload.action == "created" {
            // A comment on a PR-backed issue is PR activity.
            let activity_type = if payload.issue.pull_request.is_some() {
                "pr_comment.created"
            } else {
                "issue_comment.created"
            };
            self.append_activity(
                event,
                repository_id,
                activity_type,
                payload.issue.title.clone(),
                payload.comment.user.as_ref().map(|u| u.login.clone()),
                Some(payload.issue.number),
                occurred_at,
            )
            .await?;
        }
        Ok(DispatchOutcome::handled(repository_id))
    }

    // ------------------------------------------------------------------
    // Pull requests
    // ------------------------------------------------------------------

    async fn handle_pull_request(&self, event: &RawEvent) -> MirrorResult<DispatchOutcome> {
        let payload: PullRequestEvent = self.decode(event)?;
        let installation = self.installation_of(&payload.installation);
        let repository_id = self
            .writer
            .ensure_repository(&payload.repository, installation)
            .await?;
        let author = self
            .writer
            .ensure_user(payload.pull_request.user.as_ref())
            .await?;

        let row = self
            .writer
            .pull_row(repository_id, &payload.pull_request, author)?;
        let occurred_at = row.github_updated_at.unwrap_or_else(|| self.services.now());
        let merged = row.merged_at.is_some();
        let outcome = self
            .services
            .store
            .upsert_pull_request(row, self.services.now())
            .await?;

        if outcome == UpsertOutcome::Applied {
            let activity_type = match payload.action.as_str() {
                "opened" => Some("pr.opened"),
                "closed" if merged => Some("pr.merged"),
                "closed" => Some("pr.closed"),
                _ => None,
            };
            if let Some(activity_type) = activity_type {
                self.append_activity(
                    event,
                    repository_id,
                    activity_type,
                    payload.pull_request.title.clone(),
                    payload.sender.as_ref().map(|s| s.login.clone()),
                    Some(payload.pull_request.number),
                    occurred_at,
                )
                .await?;
            }

            // The head moved (or the PR is new): refresh the file diff set
            // out of band, keyed by head SHA.
            if matches!(payload.action.as_str(), "opened" | "synchronize") {
                self.services
                    .scheduler
                    .run_after(
                        Duration::ZERO,
                        ScheduledTask::SyncPullRequestFiles {
                            repository_id: repository_id.as_u64(),
                            pull_number: payload.pull_request.number,
                        },
                    )
                    .await
                    .ok();
            }
        }
        Ok(DispatchOutcome::handled(repository_id))
    }

    // ------------------------------------------------------------------
    // Reviews & review comments
    // ------------------------------------------------------------------

    async fn handle_review(&self, event: &RawEvent) -> MirrorResult<DispatchOutcome> {
        let payload: PullRequestReviewEvent = self.decode(event)?;
        let installation = self.installation_of(&payload.installation);
        let repository_id = self
            .writer
            .ensure_repository(&payload.repository, installation)
            .await?;
        let author = self.writer.ensure_user(payload.review.user.as_ref()).await?;

        let row = self.writer.review_row(
            repository_id,
            payload.pull_request.number,
            &payload.review,
            author,
        )?;
        let occurred_at = row.submitted_at.unwrap_or_else(|| self.services.now());
        self.services
            .store
            .upsert_review(row, self.services.now())
            .await?;

        if payload.action == "submitted" {
            self.append_activity(
                event,
                repository_id,
                format!("pr_review.{}", payload.review.state),
                payload.pull_request.title.clone(),
                payload.review.user.as_ref().map(|u| u.login.clone()),
                Some(payload.pull_request.number),
                occurred_at,
            )
            .await?;
        }
        Ok(DispatchOutcome::handled(repository_id))
    }

    async fn handle_review_comment(&self, event: &RawEvent) -> MirrorResult<DispatchOutcome> {
        let payload: PullRequestReviewCommentEvent = self.decode(event)?;
        let installation = self.installation_of(&payload.installation);
        let repository_id = self
            .writer
            .ensure_repository(&payload.repository, installation)
            .await?;

        if payload.action == "deleted" {
            self.services
                .store
                .delete_review_comment(repository_id, payload.comment.id)
                .await?;
            return Ok(DispatchOutcome::handled(repository_id));
        }

        let author = self.writer.ensure_user(payload.comment.user.as_ref()).await?;
        let row = self.writer.review_comment_row(
            repository_id,
            payload.pull_request.number,
            &payload.comment,
            author,
        )?;
        let occurred_at = row.updated_at;
        self.services.store.upsert_review_comment(row).await?;

        if payload.action == "created" {
            self.append_activity(
                event,
                repository_id,
                "pr_comment.created",
                payload.pull_request.title.clone(),
                payload.comment.user.as_ref().map(|u| u.login.clone()),
                Some(payload.pull_request.number),
                occurred_at,
            )
            .await?;
        }
        Ok(DispatchOutcome::handled(repository_id))
    }

    // ------------------------------------------------------------------
    // Push & refs
    // ------------------------------------------------------------------

    async fn handle_push(&self, event: &RawEvent) -> MirrorResult<DispatchOutcome> {
        let payload: PushEvent = self.decode(event)?;
        let installation = self.installation_of(&payload.installation);
        let repository_id = self
            .writer
            .ensure_repository(&payload.repository, installation)
            .await?;
        self.writer.ensure_user(payload.sender.as_ref()).await?;

        let Some(branch) = payload.branch_name().map(String::from) else {
            // Tag pushes update nothing the mirror tracks.
            return Ok(DispatchOutcome::handled(repository_id));
        };

        if payload.deleted {
            self.services
                .store
                .delete_branch(repository_id, &branch)
                .await?;
            return Ok(DispatchOutcome::handled(repository_id));
        }

        let now = self.services.now();
        if let Some(after) = &payload.after {
            self.services
                .store
                .upsert_branch(Branch {
                    repository_id,
                    name: branch.clone(),
                    head_sha: after.clone(),
                    protected: false,
                    updated_at: now,
                })
                .await?;
        }

        let commits = self.writer.commit_rows(repository_id, &payload.commits)?;
        let commit_count = commits.len();
        self.services.store.upsert_commits(commits).await?;

        let occurred_at = payload
            .head_commit
            .as_ref()
            .and_then(|c| c.timestamp.as_ref())
            .map(|t| writer::parse_ts(t))
            .transpose()?
            .unwrap_or(now);

        if commit_count > 0 {
            self.append_activity(
                event,
                repository_id,
                "push",
                format!("Pushed {} commits to {}", commit_count, branch),
                payload.sender.as_ref().map(|s| s.login.clone()),
                None,
                occurred_at,
            )
            .await?;
        }

        Ok(DispatchOutcome::Handled {
            repository_id: Some(repository_id),
            last_push_at: Some(occurred_at),
        })
    }

    async fn handle_ref(&self, event: &RawEvent) -> MirrorResult<DispatchOutcome> {
        let payload: RefEvent = self.decode(event)?;
        if payload.ref_type != "branch" {
            return Ok(DispatchOutcome::Ignored);
        }
        let installation = self.installation_of(&payload.installation);
        let repository_id = self
            .writer
            .ensure_repository(&payload.repository, installation)
            .await?;

        if event.event_name == "delete" {
            self.services
                .store
                .delete_branch(repository_id, &payload.ref_name)
                .await?;
        } else {
            // The create payload carries no SHA; the next push fills it in.
            self.services
                .store
                .upsert_branch(Branch {
                    repository_id,
                    name: payload.ref_name.clone(),
                    head_sha: String::new(),
                    protected: false,
                    updated_at: self.services.now(),
                })
                .await?;
        }
        Ok(DispatchOutcome::handled(repository_id))
    }

    // ------------------------------------------------------------------
    // Checks & workflows
    // ------------------------------------------------------------------

    async fn handle_check_run(&self, event: &RawEvent) -> MirrorResult<DispatchOutcome> {
        let payload: CheckRunEvent = self.decode(event)?;
        let installation = self.installation_of(&payload.installation);
        let repository_id = self
            .writer
            .ensure_repository(&payload.repository, installation)
            .await?;

        let row = self.writer.check_run_row(repository_id, &payload.check_run)?;
        let occurred_at = row.github_updated_at.unwrap_or_else(|| self.services.now());
        let name = row.name.clone().unwrap_or_else(|| "check".to_string());
        let conclusion = row.conclusion.clone();
        let outcome = self
            .services
            .store
            .upsert_check_run(row, self.services.now())
            .await?;

        if outcome == UpsertOutcome::Applied && payload.action == "completed" {
            if let Some(conclusion) = conclusion {
                if matches!(conclusion.as_str(), "success" | "failure") {
                    self.append_activity(
                        event,
                        repository_id,
                        format!("check_run.{}", conclusion),
                        format!("{} {}", name, conclusion),
                        None,
                        None,
                        occurred_at,
                    )
                    .await?;
                }
            }
        }
        Ok(DispatchOutcome::handled(repository_id))
    }

    async fn handle_workflow_run(&self, event: &RawEvent) -> MirrorResult<DispatchOutcome> {
        let payload: WorkflowRunEvent = self.decode(event)?;
        let installation = self.installation_of(&payload.installation);
        let repository_id = self
            .writer
            .ensure_repository(&payload.repository, installation)
            .await?;

        let row = self
            .writer
            .workflow_run_row(repository_id, &payload.workflow_run)?;
        let occurred_at = row.github_updated_at.unwrap_or_else(|| self.services.now());
        let name = row
            .workflow_name
            .clone()
            .unwrap_or_else(|| "workflow".to_string());
        let conclusion = row.conclusion.clone();
        let outcome = self
            .services
            .store
            .upsert_workflow_run(row, self.services.now())
            .await?;

        // Conclusion strings are GitHub's; only success/failure surface in
        // the feed.
        if outcome == UpsertOutcome::Applied
            && payload.action.as_deref() == Some("completed")
        {
            if let Some(conclusion) = conclusion {
                if matches!(conclusion.as_str(), "success" | "failure") {
                    self.append_activity(
                        event,
                        repository_id,
                        format!("workflow_run.{}", conclusion),
                        format!("{} {}", name, conclusion),
                        None,
                        None,
                        occurred_at,
                    )
                    .await?;
                }
            }
        }
        Ok(DispatchOutcome::handled(repository_id))
    }

    async fn handle_workflow_job(&self, event: &RawEvent) -> MirrorResult<DispatchOutcome> {
        let payload: WorkflowJobEvent = self.decode(event)?;
        let installation = self.installation_of(&payload.installation);
        let repository_id = self
            .writer
            .ensure_repository(&payload.repository, installation)
            .await?;
        let row = self
            .writer
            .workflow_job_row(repository_id, &payload.workflow_job)?;
        self.services.store.upsert_workflow_job(row).await?;
        Ok(DispatchOutcome::handled(repository_id))
    }

    // ------------------------------------------------------------------
    // Installations
    // ------------------------------------------------------------------

    async fn handle_installation(&self, event: &RawEvent) -> MirrorResult<DispatchOutcome> {
        let payload: InstallationEvent = self.decode(event)?;
        let account = &payload.installation.account;
        self.writer.ensure_user(Some(account)).await?;
        let now = self.services.now();
        let suspended = matches!(payload.action.as_str(), "deleted" | "suspend");
        self.services
            .store
            .upsert_installation(Installation {
                installation_id: InstallationId::new(payload.installation.id),
                account_id: crate::UserId::new(account.id),
                account_login: account.login.clone(),
                account_type: match account.user_type.as_deref() {
                    Some("Organization") => AccountType::Organization,
                    _ => AccountType::User,
                },
                suspended,
                created_at: now,
                updated_at: now,
            })
            .await?;
        Ok(DispatchOutcome::Handled {
            repository_id: None,
            last_push_at: None,
        })
    }

    // ------------------------------------------------------------------
    // Shared activity append
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    async fn append_activity(
        &self,
        event: &RawEvent,
        repository_id: RepositoryId,
        activity_type: impl Into<String>,
        title: impl Into<String>,
        actor_login: Option<String>,
        entity_number: Option<u64>,
        occurred_at: Timestamp,
    ) -> MirrorResult<()> {
        self.services
            .store
            .append_activity(ActivityEntry::for_delivery(
                event.delivery_id.as_str(),
                repository_id,
                activity_type,
                title,
                actor_login,
                entity_number,
                occurred_at,
            ))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
