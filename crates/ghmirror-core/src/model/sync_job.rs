//! Sync job rows: the unit of bootstrap/reconcile work.

use crate::{InstallationId, JobId, RepositoryId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of sync a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Initial hydration of a newly connected repository.
    Backfill,
    /// Re-run of the pipeline on a known repository to heal drift.
    Reconcile,
    /// Replay of stored raw events.
    Replay,
}

/// Scope the job operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    Repository,
    Installation,
}

/// Job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Retry,
    Done,
    Failed,
}

impl JobState {
    /// States that hold the lock key: at most one job per lock key may be
    /// in one of these.
    pub fn holds_lock(&self) -> bool {
        matches!(self, Self::Pending | Self::Running | Self::Retry)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Deterministic string identifying a unit of sync intent; dedup key for
/// job creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockKey(String);

impl LockKey {
    pub fn repo_bootstrap(
        installation_id: Option<InstallationId>,
        repository_id: RepositoryId,
    ) -> Self {
        Self(format!(
            "repo-bootstrap:{}:{}",
            Self::installation_part(installation_id),
            repository_id
        ))
    }

    pub fn repo_reconcile(
        installation_id: Option<InstallationId>,
        repository_id: RepositoryId,
    ) -> Self {
        Self(format!(
            "repo-reconcile:{}:{}",
            Self::installation_part(installation_id),
            repository_id
        ))
    }

    fn installation_part(installation_id: Option<InstallationId>) -> String {
        installation_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of bootstrap/reconcile work, orchestrated by the workflow
/// engine and gated per installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub job_id: JobId,
    pub job_type: JobType,
    pub scope_type: ScopeType,
    pub trigger_reason: String,
    pub lock_key: LockKey,
    pub installation_id: Option<InstallationId>,
    pub repository_id: Option<RepositoryId>,
    pub state: JobState,
    pub attempt_count: u32,
    pub next_run_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub current_step: Option<String>,
    pub completed_steps: Vec<String>,
    pub items_fetched: u64,
    /// Lower sorts first when the gate drains pending jobs. Typically
    /// `-stargazers_count`.
    pub priority_sort_key: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SyncJob {
    /// New pending repository-scoped job.
    pub fn for_repository(
        job_type: JobType,
        trigger_reason: impl Into<String>,
        installation_id: Option<InstallationId>,
        repository_id: RepositoryId,
        priority_sort_key: i64,
        now: Timestamp,
    ) -> Self {
        let lock_key = match job_type {
            JobType::Backfill => LockKey::repo_bootstrap(installation_id, repository_id),
            _ => LockKey::repo_reconcile(installation_id, repository_id),
        };
        Self {
            job_id: JobId::new(),
            job_type,
            scope_type: ScopeType::Repository,
            trigger_reason: trigger_reason.into(),
            lock_key,
            installation_id,
            repository_id: Some(repository_id),
            state: JobState::Pending,
            attempt_count: 0,
            next_run_at: None,
            last_error: None,
            current_step: None,
            completed_steps: Vec::new(),
            items_fetched: 0,
            priority_sort_key,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
#[path = "sync_job_tests.rs"]
mod tests;
