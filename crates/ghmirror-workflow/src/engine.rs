//! In-memory workflow engine.

use crate::step::{Journal, StepContext, StepRetryPolicy};
use crate::{Completion, CompletionHandler, CompletionKind, WorkflowBody, WorkflowId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{info, instrument};

/// Engine contract: start a workflow and receive exactly one completion
/// callback when it terminates.
#[async_trait::async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Start `body`. `context` is echoed back to the completion handler and
    /// should carry only identifiers.
    async fn start(
        &self,
        body: Arc<dyn WorkflowBody>,
        context: serde_json::Value,
        on_complete: Arc<dyn CompletionHandler>,
    ) -> WorkflowId;

    /// Cancel a running workflow. The completion handler receives a
    /// `canceled` completion; cancelling an unknown or finished workflow is
    /// a no-op.
    async fn cancel(&self, workflow_id: WorkflowId);
}

struct Running {
    abort: AbortHandle,
    context: serde_json::Value,
    on_complete: Arc<dyn CompletionHandler>,
}

/// Single-process engine keeping journals in memory.
///
/// Journals are retained after a failed or canceled run, so
/// [`InMemoryWorkflowEngine::resume`] re-runs a body with completed steps
/// replayed from the journal — the same semantics a store-backed engine
/// provides across process restarts.
pub struct InMemoryWorkflowEngine {
    running: Arc<Mutex<HashMap<WorkflowId, Running>>>,
    journals: Arc<Mutex<HashMap<WorkflowId, Arc<Journal>>>>,
    retry: StepRetryPolicy,
}

impl InMemoryWorkflowEngine {
    pub fn new(retry: StepRetryPolicy) -> Self {
        Self {
            running: Arc::new(Mutex::new(HashMap::new())),
            journals: Arc::new(Mutex::new(HashMap::new())),
            retry,
        }
    }

    /// Re-run `body` for an id whose journal is retained, skipping journaled
    /// steps. Unknown ids start fresh under the given id.
    pub async fn resume(
        &self,
        workflow_id: WorkflowId,
        body: Arc<dyn WorkflowBody>,
        context: serde_json::Value,
        on_complete: Arc<dyn CompletionHandler>,
    ) {
        let journal = self
            .journals
            .lock()
            .expect("engine lock poisoned")
            .entry(workflow_id)
            .or_default()
            .clone();
        self.spawn(workflow_id, journal, body, context, on_complete);
    }

    #[instrument(skip_all, fields(workflow_id = %workflow_id))]
    fn spawn(
        &self,
        workflow_id: WorkflowId,
        journal: Arc<Journal>,
        body: Arc<dyn WorkflowBody>,
        context: serde_json::Value,
        on_complete: Arc<dyn CompletionHandler>,
    ) {
        let running = self.running.clone();
        let journals = self.journals.clone();
        let steps = StepContext::new(journal.clone(), self.retry.clone());
        let callback_context = context.clone();
        let callback = on_complete.clone();

        // The task must not observe the registry before registration; the
        // gate closes that window.
        let (registered_tx, registered_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let _ = registered_rx.await;
            let result = body.run(steps).await;
            let completion = match result {
                Ok(()) => Completion {
                    workflow_id,
                    kind: CompletionKind::Success,
                    error: None,
                    context: callback_context,
                },
                Err(err) => Completion {
                    workflow_id,
                    kind: err.completion_kind(),
                    error: Some(err.to_string()),
                    context: callback_context,
                },
            };
            info!(kind = ?completion.kind, "workflow finished");
            // Deregister before the callback so a callback that starts new
            // workflows observes this one as finished. The journal of a
            // successful run has no further use; failed runs keep theirs for
            // resume.
            running
                .lock()
                .expect("engine lock poisoned")
                .remove(&workflow_id);
            if completion.kind == CompletionKind::Success {
                journals
                    .lock()
                    .expect("engine lock poisoned")
                    .remove(&workflow_id);
            }
            callback.on_complete(completion).await;
        });

        self.journals
            .lock()
            .expect("engine lock poisoned")
            .insert(workflow_id, journal);
        self.running.lock().expect("engine lock poisoned").insert(
            workflow_id,
            Running {
                abort: handle.abort_handle(),
                context,
                on_complete,
            },
        );
        let _ = registered_tx.send(());
    }
}

#[async_trait::async_trait]
impl WorkflowEngine for InMemoryWorkflowEngine {
    async fn start(
        &self,
        body: Arc<dyn WorkflowBody>,
        context: serde_json::Value,
        on_complete: Arc<dyn CompletionHandler>,
    ) -> WorkflowId {
        let workflow_id = WorkflowId::new();
        self.spawn(
            workflow_id,
            Arc::new(Journal::new()),
            body,
            context,
            on_complete,
        );
        workflow_id
    }

    async fn cancel(&self, workflow_id: WorkflowId) {
        let execution = self
            .running
            .lock()
            .expect("engine lock poisoned")
            .remove(&workflow_id);
        if let Some(execution) = execution {
            execution.abort.abort();
            execution
                .on_complete
                .on_complete(Completion {
                    workflow_id,
                    kind: CompletionKind::Canceled,
                    error: Some("canceled by engine".to_string()),
                    context: execution.context,
                })
                .await;
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
