//! Raw webhook event log and dead letters.

use crate::{DeliveryId, InstallationId, RepositoryId, Timestamp};
use serde::{Deserialize, Serialize};

/// Processing lifecycle of a raw event.
///
/// ```text
/// pending ──success──▶ processed
///    │                     ▲
///    ▼                     │ (replay reset)
///   retry ◀──backoff──── failed ──sweep──▶ (DeadLetter)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Pending,
    Processed,
    Failed,
    Retry,
}

impl ProcessState {
    /// Rank used by the by-state aggregate index.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Retry => 1,
            Self::Processed => 2,
            Self::Failed => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Failed => "failed",
            Self::Retry => "retry",
        }
    }

    /// Whether a processing attempt may run from this state.
    pub fn is_processable(&self) -> bool {
        matches!(self, Self::Pending | Self::Retry)
    }
}

/// Byte-exact record of one inbound webhook, keyed by delivery id.
/// Audit log and replay source; retained after processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub delivery_id: DeliveryId,
    pub event_name: String,
    pub action: Option<String>,
    pub installation_id: Option<InstallationId>,
    pub repository_id: Option<RepositoryId>,
    pub signature_valid: bool,
    pub payload_json: String,
    pub received_at: Timestamp,
    pub process_state: ProcessState,
    pub process_error: Option<String>,
    pub process_attempts: u32,
    pub next_retry_at: Option<Timestamp>,
}

impl RawEvent {
    /// Fresh intake row in `pending`.
    pub fn pending(
        delivery_id: DeliveryId,
        event_name: String,
        action: Option<String>,
        installation_id: Option<InstallationId>,
        repository_id: Option<RepositoryId>,
        payload_json: String,
        received_at: Timestamp,
    ) -> Self {
        Self {
            delivery_id,
            event_name,
            action,
            installation_id,
            repository_id,
            signature_valid: true,
            payload_json,
            received_at,
            process_state: ProcessState::Pending,
            process_error: None,
            process_attempts: 0,
            next_retry_at: None,
        }
    }

    /// Audit row for a delivery that failed signature verification.
    /// Never processed; kept for the security trail.
    pub fn signature_failure(
        delivery_id: DeliveryId,
        event_name: String,
        payload_json: String,
        received_at: Timestamp,
    ) -> Self {
        Self {
            delivery_id,
            event_name,
            action: None,
            installation_id: None,
            repository_id: None,
            signature_valid: false,
            payload_json,
            received_at,
            process_state: ProcessState::Failed,
            process_error: Some("signature verification failed".to_string()),
            process_attempts: 0,
            next_retry_at: None,
        }
    }
}

/// Origin of a dead letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadLetterSource {
    Webhook,
    Bootstrap,
    Replay,
}

/// Terminal failure record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub delivery_id: String,
    pub reason: String,
    pub payload_json: String,
    pub created_at: Timestamp,
    pub source: DeadLetterSource,
}

impl DeadLetter {
    /// Synthetic delivery id for a failed bootstrap item, e.g.
    /// `bootstrap-pulls:12345:page-3`.
    pub fn bootstrap_delivery_id(kind: &str, repository_id: RepositoryId, detail: &str) -> String {
        format!("bootstrap-{}:{}:{}", kind, repository_id, detail)
    }
}

#[cfg(test)]
#[path = "raw_event_tests.rs"]
mod tests;
