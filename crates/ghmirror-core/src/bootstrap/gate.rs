//! Per-installation concurrency gate and drain.

use crate::bootstrap::workflow::BootstrapWorkflow;
use crate::bootstrap::workflow_context;
use crate::model::{DeadLetter, DeadLetterSource, JobState};
use crate::services::Services;
use crate::{InstallationId, JobId, MirrorResult};
use ghmirror_workflow::{Completion, CompletionHandler, CompletionKind, WorkflowEngine};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of asking the gate to start a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Claimed and handed to the workflow engine.
    Started,
    /// The installation is at its cap; the job stays pending for a later
    /// drain.
    Deferred,
    /// The job was not in `pending` (already running, finished, unknown).
    NotPending,
}

struct GateInner {
    services: Services,
    engine: Arc<dyn WorkflowEngine>,
}

/// Starts bootstrap workflows under the `MAX_PER_INSTALLATION` cap and
/// drains pending jobs when running ones complete.
#[derive(Clone)]
pub struct BootstrapGate {
    inner: Arc<GateInner>,
}

impl BootstrapGate {
    pub fn new(services: Services, engine: Arc<dyn WorkflowEngine>) -> Self {
        Self {
            inner: Arc::new(GateInner { services, engine }),
        }
    }

    fn services(&self) -> &Services {
        &self.inner.services
    }

    /// Try to start one pending job. The cap check happens inside the
    /// store's claim transaction, so two concurrent starts cannot both
    /// claim the last slot.
    pub async fn start_job(&self, job_id: JobId) -> MirrorResult<StartOutcome> {
        let services = self.services();
        let Some(job) = services.store.get_sync_job(job_id).await? else {
            return Ok(StartOutcome::NotPending);
        };
        if job.state != JobState::Pending {
            return Ok(StartOutcome::NotPending);
        }
        let Some(repository_id) = job.repository_id else {
            warn!(%job_id, "sync job has no repository scope, failing it");
            services
                .store
                .complete_sync_job(
                    job_id,
                    JobState::Failed,
                    Some("job has no repository scope".to_string()),
                    services.now(),
                )
                .await?;
            return Ok(StartOutcome::NotPending);
        };

        let cap = services.config.bootstrap_max_per_installation;
        match services
            .store
            .claim_sync_job(job_id, cap, services.now())
            .await?
        {
            crate::store::ClaimOutcome::Claimed => {
                let body = Arc::new(BootstrapWorkflow::new(
                    services.clone(),
                    job_id,
                    repository_id,
                ));
                let handler: Arc<dyn CompletionHandler> = Arc::new(GateCompletionHandler {
                    gate: self.clone(),
                });
                let workflow_id = self
                    .inner
                    .engine
                    .start(body, workflow_context(&job), handler)
                    .await;
                info!(%job_id, %repository_id, %workflow_id, "bootstrap workflow started");
                Ok(StartOutcome::Started)
            }
            crate::store::ClaimOutcome::CapReached => {
                info!(%job_id, installation = ?job.installation_id, "installation at cap, deferring");
                Ok(StartOutcome::Deferred)
            }
            crate::store::ClaimOutcome::NotPending => Ok(StartOutcome::NotPending),
        }
    }

    /// Start up to `cap - running` oldest pending jobs for an installation,
    /// ordered by `(priority_sort_key, created_at)`.
    pub async fn drain(&self, installation_id: Option<InstallationId>) -> MirrorResult<usize> {
        let services = self.services();
        let cap = services.config.bootstrap_max_per_installation as u64;
        let running = services.store.running_job_count(installation_id).await?;
        let available = cap.saturating_sub(running) as usize;
        if available == 0 {
            return Ok(0);
        }
        let jobs = services
            .store
            .next_pending_jobs(installation_id, available)
            .await?;
        let mut started = 0;
        for job in jobs {
            if self.start_job(job.job_id).await? == StartOutcome::Started {
                started += 1;
            }
        }
        if started > 0 {
            info!(?installation_id, started, "drained pending sync jobs");
        }
        Ok(started)
    }

    async fn on_workflow_complete(&self, completion: Completion) {
        let services = self.services();
        let Some(job_id) = completion
            .context
            .get("job_id")
            .and_then(|v| v.as_str())
            .and_then(|s| JobId::from_str(s).ok())
        else {
            warn!(workflow_id = %completion.workflow_id, "completion context missing job id");
            return;
        };
        let installation_id = completion
            .context
            .get("installation_id")
            .and_then(|v| v.as_u64())
            .map(InstallationId::new);

        let result = match completion.kind {
            CompletionKind::Success => {
                services
                    .store
                    .complete_sync_job(job_id, JobState::Done, None, services.now())
                    .await
            }
            kind => {
                let error = completion
                    .error
                    .unwrap_or_else(|| format!("workflow ended as {:?}", kind));
                let letter = DeadLetter {
                    delivery_id: format!("workflow:{}", job_id),
                    reason: error.clone(),
                    payload_json: completion.context.to_string(),
                    created_at: services.now(),
                    source: DeadLetterSource::Bootstrap,
                };
                if let Err(err) = services.store.insert_dead_letter(letter).await {
                    warn!(%job_id, error = %err, "failed to record workflow dead letter");
                }
                services
                    .store
                    .complete_sync_job(job_id, JobState::Failed, Some(error), services.now())
                    .await
            }
        };
        if let Err(err) = result {
            warn!(%job_id, error = %err, "failed to finalize sync job");
        }

        // Completion frees a slot; pick up the next pending work.
        if let Err(err) = self.drain(installation_id).await {
            warn!(?installation_id, error = %err, "post-completion drain failed");
        }
    }
}

struct GateCompletionHandler {
    gate: BootstrapGate,
}

#[async_trait::async_trait]
impl CompletionHandler for GateCompletionHandler {
    async fn on_complete(&self, completion: Completion) {
        self.gate.on_workflow_complete(completion).await;
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
