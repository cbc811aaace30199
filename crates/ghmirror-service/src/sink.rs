//! Scheduled-task routing.
//!
//! The scheduler delivers [`ScheduledTask`] values; this sink resolves them
//! against the live pipeline. Execution is at-least-once, and every route
//! lands on an idempotent operation (conditional raw-event transitions,
//! head-SHA-guarded file replacement, cap-checked job claims), so a
//! duplicate firing is harmless.

use async_trait::async_trait;
use ghmirror_api::AppState;
use ghmirror_core::bootstrap::{sync_pull_request_details, BootstrapGate};
use ghmirror_core::ingest::EventProcessor;
use ghmirror_core::services::Services;
use ghmirror_core::{DeliveryId, InstallationId, RepositoryId};
use ghmirror_store::{ScheduledTask, TaskSink};
use std::sync::Arc;
use tracing::warn;

/// Routes scheduler firings into the pipeline.
pub struct MirrorTaskSink {
    services: Services,
    processor: Arc<EventProcessor>,
    gate: BootstrapGate,
}

impl MirrorTaskSink {
    pub fn new(state: &AppState) -> Self {
        Self {
            services: state.services.clone(),
            processor: state.processor.clone(),
            gate: state.gate.clone(),
        }
    }
}

#[async_trait]
impl TaskSink for MirrorTaskSink {
    async fn run(&self, task: ScheduledTask) {
        match task {
            ScheduledTask::ProcessRawEvent { delivery_id } => {
                let id = match DeliveryId::new(delivery_id) {
                    Ok(id) => id,
                    Err(err) => {
                        warn!(error = %err, "scheduled task carried an invalid delivery id");
                        return;
                    }
                };
                if let Err(err) = self.processor.process_delivery(&id).await {
                    warn!(delivery_id = %id, error = %err, "raw event processing failed");
                }
            }
            ScheduledTask::DrainInstallation { installation_id } => {
                let installation = installation_id.map(InstallationId::new);
                if let Err(err) = self.gate.drain(installation).await {
                    warn!(?installation, error = %err, "installation drain failed");
                }
            }
            ScheduledTask::SyncPullRequestFiles {
                repository_id,
                pull_number,
            } => {
                let repository_id = RepositoryId::new(repository_id);
                if let Err(err) =
                    sync_pull_request_details(&self.services, repository_id, pull_number).await
                {
                    warn!(
                        %repository_id,
                        pull_number,
                        error = %err,
                        "pull request detail sync failed"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
