//! Webhook intake and the raw-event retry controller.
//!
//! The gateway persists every delivery before anything interprets it: a
//! verified delivery becomes a `pending` [`RawEvent`] and a zero-delay
//! processing task; a signature failure becomes a terminal audit row. The
//! [`processor::EventProcessor`] owns the
//! `pending → processed | retry | failed` lifecycle and the two sweeps.

use crate::model::RawEvent;
use crate::services::Services;
use crate::{DeliveryId, InstallationId, MirrorError, MirrorResult, RepositoryId};
use ghmirror_store::ScheduledTask;
use std::time::Duration;
use tracing::{info, warn};

pub mod processor;
pub mod retry;

pub use processor::EventProcessor;
pub use retry::RawEventRetryPolicy;

/// Result of one gateway intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Stored and scheduled for processing.
    Accepted,
    /// Delivery id already known; nothing inserted.
    Duplicate,
    /// Signature verification failed; audit row written, no processing.
    SignatureRejected,
}

/// Webhook gateway: persistence and scheduling only, no business logic.
pub struct Gateway {
    services: Services,
}

impl Gateway {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Persist one delivery.
    ///
    /// The caller (HTTP layer) has already verified the HMAC signature
    /// against the raw body; `signature_valid` carries the verdict so the
    /// audit trail records failures too.
    ///
    /// # Errors
    ///
    /// [`MirrorError::MalformedPayload`] when the body is not JSON;
    /// [`MirrorError::Store`] when the insert fails.
    pub async fn intake(
        &self,
        delivery_id: DeliveryId,
        event_name: &str,
        payload_json: String,
        signature_valid: bool,
    ) -> MirrorResult<IntakeOutcome> {
        let now = self.services.now();

        if !signature_valid {
            let audit = RawEvent::signature_failure(
                delivery_id.clone(),
                event_name.to_string(),
                payload_json,
                now,
            );
            self.services.store.insert_raw_event(audit).await?;
            warn!(delivery_id = %delivery_id, event = %event_name, "webhook signature rejected");
            return Ok(IntakeOutcome::SignatureRejected);
        }

        // Verify it parses as JSON and pull out routing hints; full typed
        // decoding happens in the dispatcher.
        let payload: serde_json::Value =
            serde_json::from_str(&payload_json).map_err(|e| MirrorError::MalformedPayload {
                message: format!("webhook body is not valid JSON: {}", e),
            })?;
        let action = payload
            .get("action")
            .and_then(|a| a.as_str())
            .map(String::from);
        let installation_id = payload
            .get("installation")
            .and_then(|i| i.get("id"))
            .and_then(|id| id.as_u64())
            .map(InstallationId::new);
        let repository_id = payload
            .get("repository")
            .and_then(|r| r.get("id"))
            .and_then(|id| id.as_u64())
            .map(RepositoryId::new);

        let event = RawEvent::pending(
            delivery_id.clone(),
            event_name.to_string(),
            action,
            installation_id,
            repository_id,
            payload_json,
            now,
        );

        if !self.services.store.insert_raw_event(event).await? {
            info!(delivery_id = %delivery_id, "duplicate delivery, intake is a no-op");
            return Ok(IntakeOutcome::Duplicate);
        }

        self.services
            .scheduler
            .run_after(
                Duration::ZERO,
                ScheduledTask::ProcessRawEvent {
                    delivery_id: delivery_id.as_str().to_string(),
                },
            )
            .await
            .map_err(|e| MirrorError::Store(ghmirror_store::StoreError::Unavailable {
                message: format!("failed to schedule processing: {}", e),
            }))?;

        info!(delivery_id = %delivery_id, event = %event_name, "webhook accepted");
        Ok(IntakeOutcome::Accepted)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
