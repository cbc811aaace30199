//! Response envelopes for the HTTP API.

use ghmirror_core::model::{DeadLetter, RawEvent};
use ghmirror_core::optimistic::OptimisticOutcome;
use ghmirror_core::bootstrap::ConnectOutcome;
use serde::Serialize;

/// Ack for an accepted (or idempotently duplicated) webhook delivery.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    pub delivery_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub repository_id: u64,
    pub job_id: Option<String>,
    pub job_created: bool,
}

impl From<ConnectOutcome> for ConnectResponse {
    fn from(outcome: ConnectOutcome) -> Self {
        Self {
            repository_id: outcome.repository_id.as_u64(),
            job_id: outcome.job_id.map(|id| id.to_string()),
            job_created: outcome.job_created,
        }
    }
}

/// Result of an optimistic write, mirroring the stored state block.
#[derive(Debug, Serialize)]
pub struct OptimisticResponse {
    pub state: String,
    pub entity_number: Option<u64>,
    pub error_message: Option<String>,
    pub error_status: Option<u16>,
}

impl From<OptimisticOutcome> for OptimisticResponse {
    fn from(outcome: OptimisticOutcome) -> Self {
        Self {
            state: format!("{:?}", outcome.state).to_lowercase(),
            entity_number: outcome.entity_number,
            error_message: outcome.error_message,
            error_status: outcome.error_status,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplayResponse {
    pub replayed: bool,
}

#[derive(Debug, Serialize)]
pub struct RetryAllResponse {
    pub reset: usize,
}

/// Raw-event row for the admin surface (payload omitted).
#[derive(Debug, Serialize)]
pub struct RawEventSummary {
    pub delivery_id: String,
    pub event_name: String,
    pub action: Option<String>,
    pub process_state: String,
    pub process_attempts: u32,
    pub process_error: Option<String>,
    pub signature_valid: bool,
    pub received_at: String,
}

impl From<RawEvent> for RawEventSummary {
    fn from(event: RawEvent) -> Self {
        Self {
            delivery_id: event.delivery_id.as_str().to_string(),
            event_name: event.event_name,
            action: event.action,
            process_state: event.process_state.as_str().to_string(),
            process_attempts: event.process_attempts,
            process_error: event.process_error,
            signature_valid: event.signature_valid,
            received_at: event.received_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeadLetterSummary {
    pub delivery_id: String,
    pub reason: String,
    pub source: String,
    pub created_at: String,
}

impl From<DeadLetter> for DeadLetterSummary {
    fn from(letter: DeadLetter) -> Self {
        Self {
            delivery_id: letter.delivery_id,
            reason: letter.reason,
            source: format!("{:?}", letter.source).to_lowercase(),
            created_at: letter.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
