//! Tests for the in-memory workflow engine.

use super::*;
use crate::step::StepError;
use crate::WorkflowError;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::Mutex as AsyncMutex;

struct RecordingHandler {
    completions: AsyncMutex<Vec<Completion>>,
    notify: tokio::sync::Notify,
}

impl RecordingHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            completions: AsyncMutex::new(Vec::new()),
            notify: tokio::sync::Notify::new(),
        })
    }

    async fn wait_for_completion(&self) -> Completion {
        loop {
            {
                let mut completions = self.completions.lock().await;
                if let Some(completion) = completions.pop() {
                    return completion;
                }
            }
            self.notify.notified().await;
        }
    }
}

#[async_trait::async_trait]
impl CompletionHandler for RecordingHandler {
    async fn on_complete(&self, completion: Completion) {
        self.completions.lock().await.push(completion);
        self.notify.notify_one();
    }
}

struct TwoStepBody {
    first_calls: AtomicU32,
    second_calls: AtomicU32,
    fail_second: AtomicBool,
}

impl TwoStepBody {
    fn new(fail_second: bool) -> Arc<Self> {
        Arc::new(Self {
            first_calls: AtomicU32::new(0),
            second_calls: AtomicU32::new(0),
            fail_second: AtomicBool::new(fail_second),
        })
    }
}

#[async_trait::async_trait]
impl WorkflowBody for TwoStepBody {
    async fn run(&self, steps: StepContext) -> Result<(), WorkflowError> {
        let _: u32 = steps
            .run_step("first", || async {
                Ok(self.first_calls.fetch_add(1, Ordering::SeqCst))
            })
            .await?;
        let _: u32 = steps
            .run_step("second", || async {
                let calls = self.second_calls.fetch_add(1, Ordering::SeqCst);
                if self.fail_second.load(Ordering::SeqCst) {
                    Err(StepError::permanent("second step rejected"))
                } else {
                    Ok(calls)
                }
            })
            .await?;
        Ok(())
    }
}

fn engine() -> InMemoryWorkflowEngine {
    InMemoryWorkflowEngine::new(StepRetryPolicy::immediate(2))
}

#[tokio::test]
async fn test_successful_workflow_reports_success_with_context() {
    let engine = engine();
    let handler = RecordingHandler::new();
    let body = TwoStepBody::new(false);

    let id = engine
        .start(
            body.clone(),
            serde_json::json!({ "job_id": "j-1" }),
            handler.clone(),
        )
        .await;

    let completion = handler.wait_for_completion().await;
    assert_eq!(completion.workflow_id, id);
    assert_eq!(completion.kind, CompletionKind::Success);
    assert_eq!(completion.error, None);
    assert_eq!(completion.context["job_id"], "j-1");
    assert_eq!(body.first_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_step_reports_failed_completion() {
    let engine = engine();
    let handler = RecordingHandler::new();
    let body = TwoStepBody::new(true);

    engine
        .start(body, serde_json::Value::Null, handler.clone())
        .await;

    let completion = handler.wait_for_completion().await;
    assert_eq!(completion.kind, CompletionKind::Failed);
    let error = completion.error.expect("error message");
    assert!(error.contains("second"), "error names the step: {}", error);
}

#[tokio::test]
async fn test_resume_skips_completed_steps() {
    let engine = engine();
    let handler = RecordingHandler::new();
    let body = TwoStepBody::new(true);

    let id = engine
        .start(body.clone(), serde_json::Value::Null, handler.clone())
        .await;
    let first = handler.wait_for_completion().await;
    assert_eq!(first.kind, CompletionKind::Failed);
    assert_eq!(body.first_calls.load(Ordering::SeqCst), 1);

    // Heal the failure and resume: step "first" must come from the journal.
    body.fail_second.store(false, Ordering::SeqCst);
    engine
        .resume(id, body.clone(), serde_json::Value::Null, handler.clone())
        .await;
    let second = handler.wait_for_completion().await;
    assert_eq!(second.kind, CompletionKind::Success);
    assert_eq!(
        body.first_calls.load(Ordering::SeqCst),
        1,
        "journaled step not re-executed on resume"
    );
}

#[tokio::test]
async fn test_cancel_unknown_workflow_is_noop() {
    let engine = engine();
    engine.cancel(WorkflowId::new()).await;
}

struct BlockedBody;

#[async_trait::async_trait]
impl WorkflowBody for BlockedBody {
    async fn run(&self, steps: StepContext) -> Result<(), WorkflowError> {
        let _: u8 = steps
            .run_step("stall", || async {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok(0u8)
            })
            .await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_cancel_running_workflow_reports_canceled() {
    let engine = engine();
    let handler = RecordingHandler::new();

    let id = engine
        .start(
            Arc::new(BlockedBody),
            serde_json::json!({ "job_id": "j-2" }),
            handler.clone(),
        )
        .await;
    engine.cancel(id).await;

    let completion = handler.wait_for_completion().await;
    assert_eq!(completion.kind, CompletionKind::Canceled);
    assert_eq!(completion.context["job_id"], "j-2");
}
