//! Check-run and workflow rows.

use crate::{RepositoryId, Timestamp};
use serde::{Deserialize, Serialize};

/// One row per `(repository, github check-run id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    pub repository_id: RepositoryId,
    pub github_check_run_id: u64,
    pub name: Option<String>,
    pub head_sha: String,
    /// `queued | in_progress | completed` — accepted as free text.
    pub status: String,
    pub conclusion: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub github_updated_at: Option<Timestamp>,
}

impl CheckRun {
    /// Whether this run counts toward the repo's failing-check projection.
    pub fn is_failing(&self) -> bool {
        self.conclusion.as_deref() == Some("failure")
    }
}

/// One row per `(repository, github run id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub repository_id: RepositoryId,
    pub github_run_id: u64,
    pub workflow_name: Option<String>,
    pub head_sha: String,
    pub head_branch: Option<String>,
    pub status: Option<String>,
    /// Conclusion taxonomy is GitHub's; any string is stored, but activity
    /// entries are generated only for `success` and `failure`.
    pub conclusion: Option<String>,
    pub run_number: Option<u64>,
    pub github_updated_at: Option<Timestamp>,
}

/// One row per `(repository, github job id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowJob {
    pub repository_id: RepositoryId,
    pub github_job_id: u64,
    pub github_run_id: u64,
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}
