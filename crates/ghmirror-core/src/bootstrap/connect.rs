//! Repository connect flow.
//!
//! `connect_repo` is the entry point for a caller wiring a repository into
//! the mirror: fetch metadata with the caller's token, register the
//! webhook, upsert the Repository row, create the backfill SyncJob under
//! lock-key dedup, and hand it to the gate.

use crate::bootstrap::gate::{BootstrapGate, StartOutcome};
use crate::model::{JobType, Repository, SyncJob, User, UserType, Visibility};
use crate::services::Services;
use crate::store::CreateJobOutcome;
use crate::{JobId, MirrorError, MirrorResult, RepositoryId, UserId, ValidationError};
use ghmirror_github::{ApiError, TokenScope};
use tracing::{info, instrument, warn};

/// What a connect call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub repository_id: RepositoryId,
    pub job_id: Option<JobId>,
    /// `false` when a bootstrap for this repository was already in flight
    /// and the call deduplicated against it.
    pub job_created: bool,
}

/// Connect-time orchestration.
pub struct ConnectService {
    services: Services,
    gate: BootstrapGate,
    webhook_secret: String,
}

impl ConnectService {
    pub fn new(services: Services, gate: BootstrapGate, webhook_secret: String) -> Self {
        Self {
            services,
            gate,
            webhook_secret,
        }
    }

    /// Connect `full_name` (`owner/repo`) on behalf of `caller`.
    #[instrument(skip(self), fields(%full_name, %caller))]
    pub async fn connect_repo(
        &self,
        full_name: &str,
        caller: UserId,
    ) -> MirrorResult<ConnectOutcome> {
        let (owner, name) = full_name
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
            .ok_or(MirrorError::Validation(ValidationError::InvalidFormat {
                field: "full_name".to_string(),
                message: "expected owner/repo".to_string(),
            }))?;

        let scope = TokenScope {
            installation_id: None,
            connected_by_user_id: Some(caller.as_u64()),
        };
        let token = self
            .services
            .tokens
            .resolve(&scope)
            .await
            .map_err(|err| MirrorError::UpstreamRejected {
                status: Some(401),
                message: format!("no GitHub token for caller: {}", err),
            })?;

        let api_repo = self.services.github.get_repo(&token, owner, name).await?;
        let repository_id = RepositoryId::new(api_repo.id);
        let now = self.services.now();

        self.services
            .store
            .upsert_user(User {
                user_id: UserId::new(api_repo.owner.id),
                login: api_repo.owner.login.clone(),
                avatar_url: api_repo.owner.avatar_url.clone(),
                user_type: UserType::from_api(api_repo.owner.user_type.as_deref()),
                cached_at: now,
            })
            .await?;

        let existing = self.services.store.get_repository(repository_id).await?;
        let repository = Repository {
            repository_id,
            installation_id: existing.as_ref().and_then(|r| r.installation_id),
            owner_login: api_repo.owner.login.clone(),
            name: api_repo.name.clone(),
            full_name: api_repo.full_name.clone(),
            default_branch: api_repo
                .default_branch
                .clone()
                .unwrap_or_else(|| "main".to_string()),
            private: api_repo.private,
            visibility: Visibility::from_api(api_repo.visibility.as_deref(), api_repo.private),
            connected_by_user_id: Some(caller),
            stargazers_count: api_repo.stargazers_count,
            cached_at: now,
            github_updated_at: api_repo
                .updated_at
                .as_deref()
                .and_then(|t| crate::Timestamp::from_rfc3339(t).ok()),
        };
        let priority = repository.priority_sort_key();
        self.services.store.upsert_repository(repository).await?;

        // Webhook registration; an already-registered hook is not an error.
        match self
            .services
            .github
            .create_hook(
                &token,
                owner,
                name,
                &self.services.config.webhook_callback_url,
                &self.webhook_secret,
            )
            .await
        {
            Ok(hook_id) => info!(hook_id, "webhook registered"),
            Err(ApiError::Rejected { status: 422, .. }) => {
                info!("webhook already registered");
            }
            Err(err) => return Err(err.into()),
        }

        let job = SyncJob::for_repository(
            JobType::Backfill,
            format!("connected by user {}", caller),
            None,
            repository_id,
            priority,
            now,
        );
        let job_id = job.job_id;
        let lock_key = job.lock_key.clone();

        match self.services.store.create_sync_job(job).await? {
            CreateJobOutcome::Created => {
                match self.gate.start_job(job_id).await? {
                    StartOutcome::Started | StartOutcome::Deferred => {}
                    StartOutcome::NotPending => {
                        warn!(%job_id, "freshly created job not pending; racing completion")
                    }
                }
                Ok(ConnectOutcome {
                    repository_id,
                    job_id: Some(job_id),
                    job_created: true,
                })
            }
            CreateJobOutcome::DuplicateIntent => {
                let existing = self
                    .services
                    .store
                    .find_sync_job_by_lock_key(&lock_key)
                    .await?;
                info!(%repository_id, "bootstrap already in flight, deduplicated");
                Ok(ConnectOutcome {
                    repository_id,
                    job_id: existing.map(|j| j.job_id),
                    job_created: false,
                })
            }
        }
    }

    /// Admin: queue a reconcile run for a known repository.
    pub async fn reconcile_repo(
        &self,
        repository_id: RepositoryId,
        reason: &str,
    ) -> MirrorResult<ConnectOutcome> {
        let repo = self
            .services
            .store
            .get_repository(repository_id)
            .await?
            .ok_or(MirrorError::NotFound {
                entity: "repository",
                key: repository_id.to_string(),
            })?;

        let job = SyncJob::for_repository(
            JobType::Reconcile,
            reason,
            repo.installation_id,
            repository_id,
            repo.priority_sort_key(),
            self.services.now(),
        );
        let job_id = job.job_id;
        let lock_key = job.lock_key.clone();

        match self.services.store.create_sync_job(job).await? {
            CreateJobOutcome::Created => {
                self.gate.start_job(job_id).await?;
                Ok(ConnectOutcome {
                    repository_id,
                    job_id: Some(job_id),
                    job_created: true,
                })
            }
            CreateJobOutcome::DuplicateIntent => {
                let existing = self
                    .services
                    .store
                    .find_sync_job_by_lock_key(&lock_key)
                    .await?;
                Ok(ConnectOutcome {
                    repository_id,
                    job_id: existing.map(|j| j.job_id),
                    job_created: false,
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "connect_tests.rs"]
mod tests;
