//! Optimistic-write state carried on domain rows.

use crate::{CorrelationId, Timestamp};
use serde::{Deserialize, Serialize};

/// Lifecycle of an optimistic write.
///
/// `Pending` is set before the GitHub call, `Accepted`/`Failed` after it,
/// and the first matching webhook flips `Pending | Accepted` to `Confirmed`.
/// `Confirmed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimisticWriteState {
    Pending,
    Accepted,
    Failed,
    Confirmed,
}

/// Which coordinator operation produced the optimistic row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimisticOperation {
    CreateIssue,
    CreateComment,
    UpdateIssueState,
    MergePullRequest,
    UpdatePullRequestBranch,
    SubmitPrReview,
    UpdateLabels,
    UpdateAssignees,
}

/// The optimistic field block present on PullRequest, Issue, IssueComment,
/// and PullRequestReview rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimisticMeta {
    pub correlation_id: CorrelationId,
    pub operation: OptimisticOperation,
    pub state: OptimisticWriteState,
    pub error_message: Option<String>,
    pub error_status: Option<u16>,
    pub updated_at: Timestamp,
    /// Client payload retained for diagnosis; ids and small fields only.
    pub payload_json: Option<String>,
}

impl OptimisticMeta {
    /// Fresh `pending` block for a new operation.
    pub fn pending(
        correlation_id: CorrelationId,
        operation: OptimisticOperation,
        now: Timestamp,
        payload_json: Option<String>,
    ) -> Self {
        Self {
            correlation_id,
            operation,
            state: OptimisticWriteState::Pending,
            error_message: None,
            error_status: None,
            updated_at: now,
            payload_json,
        }
    }

    pub fn accepted(mut self, now: Timestamp) -> Self {
        self.state = OptimisticWriteState::Accepted;
        self.updated_at = now;
        self
    }

    pub fn failed(mut self, message: String, status: Option<u16>, now: Timestamp) -> Self {
        self.state = OptimisticWriteState::Failed;
        self.error_message = Some(message);
        self.error_status = status;
        self.updated_at = now;
        self
    }

    pub fn confirmed(mut self, now: Timestamp) -> Self {
        self.state = OptimisticWriteState::Confirmed;
        self.error_message = None;
        self.error_status = None;
        self.updated_at = now;
        self
    }

    /// Merge rule applied on every store upsert.
    ///
    /// `incoming = None` marks a webhook-sourced write: it confirms a
    /// pending/accepted block and leaves anything else untouched. A
    /// coordinator-sourced write (`incoming = Some`) replaces the block,
    /// except that a `Confirmed` block never regresses for the same
    /// correlation.
    pub fn merge(
        stored: Option<&OptimisticMeta>,
        incoming: Option<OptimisticMeta>,
        now: Timestamp,
    ) -> Option<OptimisticMeta> {
        match (stored, incoming) {
            (None, incoming) => incoming,
            (Some(stored), None) => match stored.state {
                OptimisticWriteState::Pending | OptimisticWriteState::Accepted => {
                    Some(stored.clone().confirmed(now))
                }
                OptimisticWriteState::Failed | OptimisticWriteState::Confirmed => {
                    Some(stored.clone())
                }
            },
            (Some(stored), Some(incoming)) => {
                if stored.state == OptimisticWriteState::Confirmed
                    && stored.correlation_id == incoming.correlation_id
                {
                    Some(stored.clone())
                } else {
                    Some(incoming)
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "optimistic_tests.rs"]
mod tests;
