//! Raw-event processing attempts, sweeps, and admin operations.

use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::ingest::retry::RawEventRetryPolicy;
use crate::model::{DeadLetter, DeadLetterSource, ProcessState, RawEvent};
use crate::projection::ProjectionBuilder;
use crate::services::Services;
use crate::{DeliveryId, MirrorResult};
use ghmirror_store::ScheduledTask;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Drives one raw event through a processing attempt and owns the retry /
/// dead-letter sweeps.
pub struct EventProcessor {
    services: Services,
    dispatcher: Dispatcher,
    projections: ProjectionBuilder,
    retry: RawEventRetryPolicy,
}

impl EventProcessor {
    pub fn new(services: Services) -> Self {
        let retry = RawEventRetryPolicy::from_config(&services.config);
        Self {
            dispatcher: Dispatcher::new(services.clone()),
            projections: ProjectionBuilder::new(services.clone()),
            services,
            retry,
        }
    }

    /// Run one processing attempt for `delivery_id`.
    ///
    /// Converges under concurrency: the terminal transition is conditional
    /// on the row still being `pending`/`retry`, so a racing attempt that
    /// lost observes the moved state and does nothing.
    #[instrument(skip(self), fields(delivery_id = %delivery_id))]
    pub async fn process_delivery(&self, delivery_id: &DeliveryId) -> MirrorResult<()> {
        let Some(event) = self.services.store.get_raw_event(delivery_id).await? else {
            warn!("scheduled delivery no longer exists");
            return Ok(());
        };
        if !event.process_state.is_processable() {
            return Ok(());
        }

        match self.dispatcher.dispatch(&event).await {
            Ok(outcome) => {
                self.services
                    .store
                    .transition_raw_event(
                        delivery_id,
                        &[ProcessState::Pending, ProcessState::Retry],
                        ProcessState::Processed,
                        None,
                        event.process_attempts,
                        None,
                    )
                    .await?;
                // The raw row is already processed; a projection failure is
                // reported but must not fail the event.
                if let DispatchOutcome::Handled {
                    repository_id: Some(repository_id),
                    last_push_at,
                } = outcome
                {
                    if let Err(err) = self.projections.rebuild(repository_id, last_push_at).await {
                        warn!(%repository_id, error = %err, "projection rebuild failed");
                    }
                }
                Ok(())
            }
            Err(err) if !err.is_transient() => {
                warn!(error = %err, "deterministic failure, not retrying");
                self.services
                    .store
                    .transition_raw_event(
                        delivery_id,
                        &[ProcessState::Pending, ProcessState::Retry],
                        ProcessState::Failed,
                        Some(err.to_string()),
                        event.process_attempts + 1,
                        None,
                    )
                    .await?;
                Ok(())
            }
            Err(err) => {
                let attempts = event.process_attempts + 1;
                if self.retry.should_retry(attempts) {
                    let backoff = self.retry.backoff_delay(attempts);
                    // A Retry-After hint from the upstream overrides a
                    // shorter computed backoff.
                    let delay = err.retry_after().map_or(backoff, |hint| hint.max(backoff));
                    let next_retry_at = self.services.now().saturating_add(delay);
                    info!(
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, scheduling retry"
                    );
                    self.services
                        .store
                        .transition_raw_event(
                            delivery_id,
                            &[ProcessState::Pending, ProcessState::Retry],
                            ProcessState::Retry,
                            Some(err.to_string()),
                            attempts,
                            Some(next_retry_at),
                        )
                        .await?;
                } else {
                    warn!(attempts, error = %err, "retry budget exhausted, marking failed");
                    self.services
                        .store
                        .transition_raw_event(
                            delivery_id,
                            &[ProcessState::Pending, ProcessState::Retry],
                            ProcessState::Failed,
                            Some(err.to_string()),
                            attempts,
                            None,
                        )
                        .await?;
                }
                Ok(())
            }
        }
    }

    /// Retry sweep (every 30s): schedule rows whose backoff has elapsed.
    pub async fn run_retry_sweep(&self) -> MirrorResult<usize> {
        let now = self.services.now();
        let due = self.services.store.due_retry_events(now, 100).await?;
        let count = due.len();
        for event in due {
            self.schedule_processing(&event.delivery_id).await?;
        }
        if count > 0 {
            info!(count, "retry sweep scheduled events");
        }
        Ok(count)
    }

    /// Dead-letter sweep (every 60s): graduate old `failed` rows.
    pub async fn run_dead_letter_sweep(&self) -> MirrorResult<usize> {
        let cutoff = self
            .services
            .now()
            .saturating_sub(self.services.config.dead_letter_age());
        let expired = self.services.store.failed_events_before(cutoff, 100).await?;
        let count = expired.len();
        for event in expired {
            self.dead_letter_event(event).await?;
        }
        if count > 0 {
            info!(count, "dead-letter sweep graduated events");
        }
        Ok(count)
    }

    async fn dead_letter_event(&self, event: RawEvent) -> MirrorResult<()> {
        let letter = DeadLetter {
            delivery_id: event.delivery_id.as_str().to_string(),
            reason: "max-attempts-exceeded".to_string(),
            payload_json: event.payload_json.clone(),
            created_at: self.services.now(),
            source: DeadLetterSource::Webhook,
        };
        self.services.store.insert_dead_letter(letter).await?;
        self.services
            .store
            .delete_raw_event(&event.delivery_id)
            .await?;
        warn!(delivery_id = %event.delivery_id, "raw event dead-lettered");
        Ok(())
    }

    /// Admin: reset one delivery to `pending` and schedule it.
    /// Returns `false` when the row is unknown or not resettable.
    pub async fn replay_delivery(&self, delivery_id: &DeliveryId) -> MirrorResult<bool> {
        let reset = self
            .services
            .store
            .transition_raw_event(
                delivery_id,
                &[ProcessState::Processed, ProcessState::Failed, ProcessState::Retry],
                ProcessState::Pending,
                None,
                0,
                None,
            )
            .await?;
        if reset {
            self.schedule_processing(delivery_id).await?;
            info!(%delivery_id, "delivery reset for replay");
        }
        Ok(reset)
    }

    /// Admin: reset every `failed` row and schedule them all.
    pub async fn retry_all_failed(&self) -> MirrorResult<usize> {
        let failed = self
            .services
            .store
            .list_raw_events_by_state(ProcessState::Failed, 500)
            .await?;
        let mut count = 0;
        for event in failed {
            if self.replay_delivery(&event.delivery_id).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn schedule_processing(&self, delivery_id: &DeliveryId) -> MirrorResult<()> {
        self.services
            .scheduler
            .run_after(
                Duration::ZERO,
                ScheduledTask::ProcessRawEvent {
                    delivery_id: delivery_id.as_str().to_string(),
                },
            )
            .await
            .map_err(|e| {
                crate::MirrorError::Store(ghmirror_store::StoreError::Unavailable {
                    message: format!("failed to schedule processing: {}", e),
                })
            })
    }
}
