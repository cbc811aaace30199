//! Tests for scheduled-task routing through the sink.

use super::*;
use ghmirror_api::WebhookSecret;
use ghmirror_core::model::ProcessState;
use ghmirror_core::store::MetadataStore;
use ghmirror_core::testing::{payloads, TestHarness};
use ghmirror_workflow::{InMemoryWorkflowEngine, StepRetryPolicy};

fn state_for(harness: &TestHarness) -> AppState {
    let engine = Arc::new(InMemoryWorkflowEngine::new(StepRetryPolicy::immediate(2)));
    AppState::new(
        harness.services.clone(),
        engine,
        WebhookSecret::new("hook-secret"),
    )
}

#[tokio::test]
async fn test_process_raw_event_task_runs_processor() {
    let harness = TestHarness::new();
    let state = state_for(&harness);
    let sink = MirrorTaskSink::new(&state);

    state
        .gateway
        .intake(
            DeliveryId::new("d-1").expect("id"),
            "issues",
            payloads::issues_event(12345, "opened", 1, "T", "open", "2026-02-18T10:00:00Z"),
            true,
        )
        .await
        .expect("intake");

    sink.run(ScheduledTask::ProcessRawEvent {
        delivery_id: "d-1".to_string(),
    })
    .await;

    let event = harness
        .store
        .get_raw_event(&DeliveryId::new("d-1").expect("id"))
        .await
        .expect("get")
        .expect("present");
    assert_eq!(event.process_state, ProcessState::Processed);
}

#[tokio::test]
async fn test_unknown_delivery_task_is_harmless() {
    let harness = TestHarness::new();
    let state = state_for(&harness);
    let sink = MirrorTaskSink::new(&state);

    sink.run(ScheduledTask::ProcessRawEvent {
        delivery_id: "never-seen".to_string(),
    })
    .await;
    sink.run(ScheduledTask::SyncPullRequestFiles {
        repository_id: 404,
        pull_number: 1,
    })
    .await;
    sink.run(ScheduledTask::DrainInstallation {
        installation_id: None,
    })
    .await;
}
