//! Optimistic write coordinator.
//!
//! Each operation takes a client-generated correlation id, writes the
//! optimistic effect to the store *before* any network call, then issues
//! the GitHub write and records `accepted` (with server-returned ids) or
//! `failed` (with message and status, no rollback). The first matching
//! webhook flips `pending | accepted` to `confirmed` in the dispatcher.
//!
//! A reused correlation id fails with
//! [`MirrorError::DuplicateOperation`] before any GitHub call — this is
//! what makes client retries after an unknown outcome safe.

use crate::model::*;
use crate::services::Services;
use crate::{CorrelationId, MirrorError, MirrorResult, RepositoryId, Timestamp, UserId};
use ghmirror_github::{AccessToken, ApiError, TokenScope};
use tracing::{info, instrument, warn};

/// What the caller gets back from an optimistic operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticOutcome {
    pub state: OptimisticWriteState,
    /// Entity number, filled in once GitHub assigns one.
    pub entity_number: Option<u64>,
    pub error_message: Option<String>,
    pub error_status: Option<u16>,
}

impl OptimisticOutcome {
    fn accepted(entity_number: Option<u64>) -> Self {
        Self {
            state: OptimisticWriteState::Accepted,
            entity_number,
            error_message: None,
            error_status: None,
        }
    }

    fn failed(err: &ApiError) -> Self {
        Self {
            state: OptimisticWriteState::Failed,
            entity_number: None,
            error_message: Some(err.to_string()),
            error_status: err.status(),
        }
    }
}

struct RepoRef {
    owner: String,
    name: String,
    scope: TokenScope,
}

/// The mutating surface the UI calls.
pub struct OptimisticCoordinator {
    services: Services,
}

impl OptimisticCoordinator {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    fn now(&self) -> Timestamp {
        self.services.now()
    }

    async fn claim_correlation(&self, correlation_id: &CorrelationId) -> MirrorResult<()> {
        if !self.services.store.register_correlation(correlation_id).await? {
            return Err(MirrorError::DuplicateOperation {
                correlation_id: correlation_id.clone(),
            });
        }
        Ok(())
    }

    async fn repo_ref(&self, repository_id: RepositoryId, caller: UserId) -> MirrorResult<RepoRef> {
        let repo = self
            .services
            .store
            .get_repository(repository_id)
            .await?
            .ok_or(MirrorError::NotFound {
                entity: "repository",
                key: repository_id.to_string(),
            })?;
        Ok(RepoRef {
            owner: repo.owner_login,
            name: repo.name,
            scope: TokenScope {
                installation_id: repo.installation_id.map(|i| i.as_u64()),
                connected_by_user_id: Some(
                    repo.connected_by_user_id.unwrap_or(caller).as_u64(),
                ),
            },
        })
    }

    async fn token(&self, scope: &TokenScope) -> Result<AccessToken, ApiError> {
        self.services
            .tokens
            .resolve(scope)
            .await
            .map_err(|e| ApiError::Auth {
                message: e.to_string(),
            })
    }

    async fn caller_login(&self, caller: UserId) -> MirrorResult<Option<String>> {
        Ok(self
            .services
            .store
            .get_user(caller)
            .await?
            .map(|u| u.login))
    }

    // ------------------------------------------------------------------
    // createIssue
    // ------------------------------------------------------------------

    #[instrument(skip(self, title), fields(%repository_id, correlation = %correlation_id))]
    pub async fn create_issue(
        &self,
        repository_id: RepositoryId,
        caller: UserId,
        correlation_id: CorrelationId,
        title: String,
    ) -> MirrorResult<OptimisticOutcome> {
        self.claim_correlation(&correlation_id).await?;
        let repo = self.repo_ref(repository_id, caller).await?;
        let now = self.now();

        let mut stub = Issue {
            doc_id: new_doc_id(),
            repository_id,
            number: None,
            github_issue_id: None,
            state: IssueState::Open,
            title: title.clone(),
            body: None,
            author_user_id: Some(caller),
            author_login: self.caller_login(caller).await?,
            label_names: vec![],
            assignee_user_ids: vec![],
            is_pull_request: false,
            created_at: now,
            closed_at: None,
            github_updated_at: None,
            optimistic: Some(OptimisticMeta::pending(
                correlation_id.clone(),
                OptimisticOperation::CreateIssue,
                now,
                Some(serde_json::json!({ "title": title }).to_string()),
            )),
        };
        self.services.store.insert_issue(stub.clone()).await?;

        let result = match self.token(&repo.scope).await {
            Ok(token) => {
                self.services
                    .github
                    .create_issue(&token, &repo.owner, &repo.name, &title, None)
                    .await
            }
            Err(err) => Err(err),
        };

        let now = self.now();
        match result {
            Ok(api_issue) => {
                stub.number = Some(api_issue.number);
                stub.github_issue_id = Some(api_issue.id);
                stub.optimistic = stub.optimistic.map(|m| m.accepted(now));
                self.services.store.update_issue(stub, now).await?;
                info!(number = api_issue.number, "issue create accepted");
                Ok(OptimisticOutcome::accepted(Some(api_issue.number)))
            }
            Err(err) => {
                warn!(error = %err, "issue create rejected");
                stub.optimistic = stub
                    .optimistic
                    .map(|m| m.failed(err.to_string(), err.status(), now));
                self.services.store.update_issue(stub, now).await?;
                Ok(OptimisticOutcome::failed(&err))
            }
        }
    }

    // ------------------------------------------------------------------
    // createComment
    // ------------------------------------------------------------------

    pub async fn create_comment(
        &self,
        repository_id: RepositoryId,
        caller: UserId,
        correlation_id: CorrelationId,
        issue_number: u64,
        body: String,
    ) -> MirrorResult<OptimisticOutcome> {
        self.claim_correlation(&correlation_id).await?;
        let repo = self.repo_ref(repository_id, caller).await?;
        let now = self.now();

        let mut stub = IssueComment {
            doc_id: new_doc_id(),
            repository_id,
            issue_number,
            github_comment_id: None,
            author_user_id: Some(caller),
            author_login: self.caller_login(caller).await?,
            body: body.clone(),
            created_at: now,
            updated_at: now,
            optimistic: Some(OptimisticMeta::pending(
                correlation_id.clone(),
                OptimisticOperation::CreateComment,
                now,
                None,
            )),
        };
        self.services.store.insert_issue_comment(stub.clone()).await?;

        let result = match self.token(&repo.scope).await {
            Ok(token) => {
                self.services
                    .github
                    .create_issue_comment(&token, &repo.owner, &repo.name, issue_number, &body)
                    .await
            }
            Err(err) => Err(err),
        };

        let now = self.now();
        match result {
            Ok(api_comment) => {
                stub.github_comment_id = Some(api_comment.id);
                stub.optimistic = stub.optimistic.map(|m| m.accepted(now));
                self.services.store.update_issue_comment(stub, now).await?;
                Ok(OptimisticOutcome::accepted(Some(issue_number)))
            }
            Err(err) => {
                stub.optimistic = stub
                    .optimistic
                    .map(|m| m.failed(err.to_string(), err.status(), now));
                self.services.store.update_issue_comment(stub, now).await?;
                Ok(OptimisticOutcome::failed(&err))
            }
        }
    }

    // ------------------------------------------------------------------
    // updateIssueState
    // ------------------------------------------------------------------

    pub async fn update_issue_state(
        &self,
        repository_id: RepositoryId,
        caller: UserId,
        correlation_id: CorrelationId,
        issue_number: u64,
        state: IssueState,
    ) -> MirrorResult<OptimisticOutcome> {
        self.claim_correlation(&correlation_id).await?;
        let repo = self.repo_ref(repository_id, caller).await?;
        let mut issue = self
            .services
            .store
            .get_issue(repository_id, issue_number)
            .await?
            .ok_or(MirrorError::NotFound {
                entity: "issue",
                key: format!("{}#{}", repository_id, issue_number),
            })?;
        let now = self.now();

        issue.state = state;
        issue.closed_at = match state {
            IssueState::Closed => Some(now),
            IssueState::Open => None,
        };
        issue.optimistic = Some(OptimisticMeta::pending(
            correlation_id.clone(),
            OptimisticOperation::UpdateIssueState,
            now,
            Some(serde_json::json!({ "state": state.as_str() }).to_string()),
        ));
        self.services.store.update_issue(issue.clone(), now).await?;

        self.finish_issue_write(repo, issue, issue_number, |github, token, owner, name| {
            let state = state.as_str();
            Box::pin(async move {
                github
                    .update_issue_state(&token, &owner, &name, issue_number, state)
                    .await
                    .map(|_| ())
            })
        })
        .await
    }

    // ------------------------------------------------------------------
    // mergePullRequest
    // ------------------------------------------------------------------

    pub async fn merge_pull_request(
        &self,
        repository_id: RepositoryId,
        caller: UserId,
        correlation_id: CorrelationId,
        number: u64,
        method: Option<String>,
    ) -> MirrorResult<OptimisticOutcome> {
        self.claim_correlation(&correlation_id).await?;
        let repo = self.repo_ref(repository_id, caller).await?;
        let mut pull = self
            .services
            .store
            .get_pull_request(repository_id, number)
            .await?
            .ok_or(MirrorError::NotFound {
                entity: "pull_request",
                key: format!("{}#{}", repository_id, number),
            })?;
        let now = self.now();

        pull.state = PrState::Closed;
        pull.merged_at = Some(now);
        pull.closed_at = Some(now);
        pull.optimistic = Some(OptimisticMeta::pending(
            correlation_id.clone(),
            OptimisticOperation::MergePullRequest,
            now,
            method
                .as_deref()
                .map(|m| serde_json::json!({ "method": m }).to_string()),
        ));
        self.services
            .store
            .upsert_pull_request(pull.clone(), now)
            .await?;

        let result = match self.token(&repo.scope).await {
            Ok(token) => {
                self.services
                    .github
                    .merge_pull(&token, &repo.owner, &repo.name, number, method.as_deref())
                    .await
            }
            Err(err) => Err(err),
        };

        let now = self.now();
        match result {
            Ok(merge) => {
                if let Some(sha) = merge.sha {
                    pull.head_sha = sha;
                }
                pull.optimistic = pull.optimistic.map(|m| m.accepted(now));
                self.services.store.upsert_pull_request(pull, now).await?;
                Ok(OptimisticOutcome::accepted(Some(number)))
            }
            Err(err) => {
                pull.optimistic = pull
                    .optimistic
                    .map(|m| m.failed(err.to_string(), err.status(), now));
                self.services.store.upsert_pull_request(pull, now).await?;
                Ok(OptimisticOutcome::failed(&err))
            }
        }
    }

    // ------------------------------------------------------------------
    // updatePullRequestBranch
    // ------------------------------------------------------------------

    pub async fn update_pull_request_branch(
        &self,
        repository_id: RepositoryId,
        caller: UserId,
        correlation_id: CorrelationId,
        number: u64,
        expected_head_sha: String,
    ) -> MirrorResult<OptimisticOutcome> {
        self.claim_correlation(&correlation_id).await?;
        let repo = self.repo_ref(repository_id, caller).await?;
        let mut pull = self
            .services
            .store
            .get_pull_request(repository_id, number)
            .await?
            .ok_or(MirrorError::NotFound {
                entity: "pull_request",
                key: format!("{}#{}", repository_id, number),
            })?;
        let now = self.now();

        pull.head_sha = expected_head_sha.clone();
        pull.optimistic = Some(OptimisticMeta::pending(
            correlation_id.clone(),
            OptimisticOperation::UpdatePullRequestBranch,
            now,
            None,
        ));
        self.services
            .store
            .upsert_pull_request(pull.clone(), now)
            .await?;

        let result = match self.token(&repo.scope).await {
            Ok(token) => {
                self.services
                    .github
                    .update_pull_branch(&token, &repo.owner, &repo.name, number, &expected_head_sha)
                    .await
            }
            Err(err) => Err(err),
        };

        let now = self.now();
        match result {
            Ok(()) => {
                pull.optimistic = pull.optimistic.map(|m| m.accepted(now));
                self.services.store.upsert_pull_request(pull, now).await?;
                Ok(OptimisticOutcome::accepted(Some(number)))
            }
            Err(err) => {
                pull.optimistic = pull
                    .optimistic
                    .map(|m| m.failed(err.to_string(), err.status(), now));
                self.services.store.upsert_pull_request(pull, now).await?;
                Ok(OptimisticOutcome::failed(&err))
            }
        }
    }

    // ------------------------------------------------------------------
    // submitPrReview
    // ------------------------------------------------------------------

    pub async fn submit_pr_review(
        &self,
        repository_id: RepositoryId,
        caller: UserId,
        correlation_id: CorrelationId,
        number: u64,
        event: String,
        body: Option<String>,
    ) -> MirrorResult<OptimisticOutcome> {
        self.claim_correlation(&correlation_id).await?;
        let repo = self.repo_ref(repository_id, caller).await?;
        let now = self.now();

        let optimistic_state = match event.as_str() {
            "APPROVE" => "approved",
            "REQUEST_CHANGES" => "changes_requested",
            _ => "commented",
        };
        let mut stub = PullRequestReview {
            doc_id: new_doc_id(),
            repository_id,
            pull_request_number: number,
            github_review_id: None,
            author_user_id: Some(caller),
            author_login: self.caller_login(caller).await?,
            state: optimistic_state.to_string(),
            body: body.clone(),
            submitted_at: Some(now),
            commit_sha: None,
            optimistic: Some(OptimisticMeta::pending(
                correlation_id.clone(),
                OptimisticOperation::SubmitPrReview,
                now,
                Some(serde_json::json!({ "event": event }).to_string()),
            )),
        };
        self.services.store.insert_review(stub.clone()).await?;

        let result = match self.token(&repo.scope).await {
            Ok(token) => {
                self.services
                    .github
                    .submit_review(
                        &token,
                        &repo.owner,
                        &repo.name,
                        number,
                        &event,
                        body.as_deref(),
                    )
                    .await
            }
            Err(err) => Err(err),
        };

        let now = self.now();
        match result {
            Ok(api_review) => {
                stub.github_review_id = Some(api_review.id);
                stub.state = api_review.state;
                stub.optimistic = stub.optimistic.map(|m| m.accepted(now));
                self.services.store.update_review(stub, now).await?;
                Ok(OptimisticOutcome::accepted(Some(number)))
            }
            Err(err) => {
                stub.optimistic = stub
                    .optimistic
                    .map(|m| m.failed(err.to_string(), err.status(), now));
                self.services.store.update_review(stub, now).await?;
                Ok(OptimisticOutcome::failed(&err))
            }
        }
    }

    // ------------------------------------------------------------------
    // updateLabels
    // ------------------------------------------------------------------

    pub async fn update_labels(
        &self,
        repository_id: RepositoryId,
        caller: UserId,
        correlation_id: CorrelationId,
        issue_number: u64,
        add: Vec<String>,
        remove: Vec<String>,
    ) -> MirrorResult<OptimisticOutcome> {
        self.claim_correlation(&correlation_id).await?;
        let repo = self.repo_ref(repository_id, caller).await?;
        let mut issue = self
            .services
            .store
            .get_issue(repository_id, issue_number)
            .await?
            .ok_or(MirrorError::NotFound {
                entity: "issue",
                key: format!("{}#{}", repository_id, issue_number),
            })?;
        let now = self.now();

        issue.label_names.retain(|name| !remove.contains(name));
        for name in add {
            if !issue.label_names.contains(&name) {
                issue.label_names.push(name);
            }
        }
        let final_labels = issue.label_names.clone();
        issue.optimistic = Some(OptimisticMeta::pending(
            correlation_id.clone(),
            OptimisticOperation::UpdateLabels,
            now,
            None,
        ));
        self.services.store.update_issue(issue.clone(), now).await?;

        self.finish_issue_write(repo, issue, issue_number, move |github, token, owner, name| {
            let labels = final_labels.clone();
            Box::pin(async move {
                github
                    .set_labels(&token, &owner, &name, issue_number, &labels)
                    .await
                    .map(|_| ())
            })
        })
        .await
    }

    // ------------------------------------------------------------------
    // updateAssignees
    // ------------------------------------------------------------------

    pub async fn update_assignees(
        &self,
        repository_id: RepositoryId,
        caller: UserId,
        correlation_id: CorrelationId,
        issue_number: u64,
        add: Vec<String>,
        remove: Vec<String>,
    ) -> MirrorResult<OptimisticOutcome> {
        self.claim_correlation(&correlation_id).await?;
        let repo = self.repo_ref(repository_id, caller).await?;
        let mut issue = self
            .services
            .store
            .get_issue(repository_id, issue_number)
            .await?
            .ok_or(MirrorError::NotFound {
                entity: "issue",
                key: format!("{}#{}", repository_id, issue_number),
            })?;
        let now = self.now();

        // Assignments are stored as numeric ids; logins resolve through the
        // user table and unknown logins are left for the webhook to add.
        let mut remove_ids = Vec::new();
        for login in &remove {
            if let Some(user) = self.services.store.find_user_by_login(login).await? {
                remove_ids.push(user.user_id);
            }
        }
        issue.assignee_user_ids.retain(|id| !remove_ids.contains(id));
        for login in &add {
            if let Some(user) = self.services.store.find_user_by_login(login).await? {
                if !issue.assignee_user_ids.contains(&user.user_id) {
                    issue.assignee_user_ids.push(user.user_id);
                }
            }
        }
        issue.optimistic = Some(OptimisticMeta::pending(
            correlation_id.clone(),
            OptimisticOperation::UpdateAssignees,
            now,
            None,
        ));
        self.services.store.update_issue(issue.clone(), now).await?;

        self.finish_issue_write(repo, issue, issue_number, move |github, token, owner, name| {
            let add = add.clone();
            let remove = remove.clone();
            Box::pin(async move {
                if !remove.is_empty() {
                    github
                        .remove_assignees(&token, &owner, &name, issue_number, &remove)
                        .await?;
                }
                if !add.is_empty() {
                    github
                        .add_assignees(&token, &owner, &name, issue_number, &add)
                        .await?;
                }
                Ok(())
            })
        })
        .await
    }

    // ------------------------------------------------------------------
    // Shared accept/reject recording for issue-backed writes
    // ------------------------------------------------------------------

    async fn finish_issue_write<F>(
        &self,
        repo: RepoRef,
        mut issue: Issue,
        entity_number: u64,
        call: F,
    ) -> MirrorResult<OptimisticOutcome>
    where
        F: FnOnce(
            std::sync::Arc<dyn ghmirror_github::GithubApi>,
            AccessToken,
            String,
            String,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<(), ApiError>> + Send>,
        >,
    {
        let result = match self.token(&repo.scope).await {
            Ok(token) => {
                call(
                    self.services.github.clone(),
                    token,
                    repo.owner.clone(),
                    repo.name.clone(),
                )
                .await
            }
            Err(err) => Err(err),
        };

        let now = self.now();
        match result {
            Ok(()) => {
                issue.optimistic = issue.optimistic.map(|m| m.accepted(now));
                self.services.store.update_issue(issue, now).await?;
                Ok(OptimisticOutcome::accepted(Some(entity_number)))
            }
            Err(err) => {
                issue.optimistic = issue
                    .optimistic
                    .map(|m| m.failed(err.to_string(), err.status(), now));
                self.services.store.update_issue(issue, now).await?;
                Ok(OptimisticOutcome::failed(&err))
            }
        }
    }
}

#[cfg(test)]
#[path = "optimistic_tests.rs"]
mod tests;
