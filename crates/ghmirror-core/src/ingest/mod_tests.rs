//! Tests for gateway intake and the processor lifecycle.

use super::*;
use crate::model::{DeadLetterSource, ProcessState};
use crate::store::MetadataStore;
use crate::testing::{payloads, TestHarness};
use crate::Timestamp;

fn delivery(id: &str) -> DeliveryId {
    DeliveryId::new(id).expect("valid delivery id")
}

// ============================================================================
// Gateway intake
// ============================================================================

mod intake_tests {
    use super::*;

    #[tokio::test]
    async fn test_accepted_intake_persists_and_schedules() {
        let harness = TestHarness::new();
        let gateway = Gateway::new(harness.services.clone());

        let outcome = gateway
            .intake(
                delivery("d-1"),
                "issues",
                payloads::issues_event(12345, "opened", 1, "T", "open", "2026-02-18T10:00:00Z"),
                true,
            )
            .await
            .expect("intake");
        assert_eq!(outcome, IntakeOutcome::Accepted);

        let event = harness
            .store
            .get_raw_event(&delivery("d-1"))
            .await
            .expect("get")
            .expect("present");
        assert_eq!(event.process_state, ProcessState::Pending);
        assert_eq!(event.event_name, "issues");
        assert_eq!(event.action.as_deref(), Some("opened"));
        assert_eq!(event.repository_id, Some(RepositoryId::new(12345)));
        assert!(event.signature_valid);

        let tasks = harness.scheduler.drain();
        assert_eq!(
            tasks,
            [ghmirror_store::ScheduledTask::ProcessRawEvent {
                delivery_id: "d-1".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_duplicate_delivery_returns_success_without_insert() {
        let harness = TestHarness::new();
        let gateway = Gateway::new(harness.services.clone());
        let payload =
            payloads::issues_event(12345, "opened", 1, "T", "open", "2026-02-18T10:00:00Z");

        let first = gateway
            .intake(delivery("d-1"), "issues", payload.clone(), true)
            .await
            .expect("intake");
        let second = gateway
            .intake(delivery("d-1"), "issues", payload, true)
            .await
            .expect("intake");

        assert_eq!(first, IntakeOutcome::Accepted);
        assert_eq!(second, IntakeOutcome::Duplicate);
        assert_eq!(
            harness
                .store
                .count_raw_events_by_state(ProcessState::Pending)
                .await
                .expect("count"),
            1
        );
        // Only the first intake scheduled processing.
        assert_eq!(harness.scheduler.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed_payload() {
        let harness = TestHarness::new();
        let gateway = Gateway::new(harness.services.clone());

        let err = gateway
            .intake(delivery("d-1"), "issues", "{not json".to_string(), true)
            .await
            .expect_err("must fail");
        assert!(matches!(err, MirrorError::MalformedPayload { .. }));
    }

    #[tokio::test]
    async fn test_signature_failure_writes_audit_row() {
        let harness = TestHarness::new();
        let gateway = Gateway::new(harness.services.clone());

        let outcome = gateway
            .intake(delivery("d-bad"), "push", "{}".to_string(), false)
            .await
            .expect("intake");
        assert_eq!(outcome, IntakeOutcome::SignatureRejected);

        let event = harness
            .store
            .get_raw_event(&delivery("d-bad"))
            .await
            .expect("get")
            .expect("audit row present");
        assert!(!event.signature_valid);
        assert_eq!(event.process_state, ProcessState::Failed);
        // Nothing scheduled for a rejected delivery.
        assert!(harness.scheduler.drain().is_empty());
    }
}

// ============================================================================
// Processor lifecycle
// ============================================================================

mod processor_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_processing_marks_processed() {
        let harness = TestHarness::new();
        let gateway = Gateway::new(harness.services.clone());
        let processor = EventProcessor::new(harness.services.clone());

        gateway
            .intake(
                delivery("d-1"),
                "issues",
                payloads::issues_event(12345, "opened", 1, "T", "open", "2026-02-18T10:00:00Z"),
                true,
            )
            .await
            .expect("intake");
        harness.run_processing(&processor).await;

        let event = harness
            .store
            .get_raw_event(&delivery("d-1"))
            .await
            .expect("get")
            .expect("present");
        assert_eq!(event.process_state, ProcessState::Processed);
        assert!(harness
            .store
            .get_issue(RepositoryId::new(12345), 1)
            .await
            .expect("get")
            .is_some());
    }

    #[tokio::test]
    async fn test_malformed_payload_fails_without_retry() {
        let harness = TestHarness::new();
        let gateway = Gateway::new(harness.services.clone());
        let processor = EventProcessor::new(harness.services.clone());

        // Valid JSON, but not a decodable issues payload.
        gateway
            .intake(delivery("d-1"), "issues", r#"{"action":"opened"}"#.to_string(), true)
            .await
            .expect("intake");
        harness.run_processing(&processor).await;

        let event = harness
            .store
            .get_raw_event(&delivery("d-1"))
            .await
            .expect("get")
            .expect("present");
        assert_eq!(event.process_state, ProcessState::Failed);
        assert_eq!(event.process_attempts, 1);
        assert!(event
            .process_error
            .as_deref()
            .expect("error recorded")
            .contains("decode"));
    }

    #[tokio::test]
    async fn test_unknown_event_is_processed_with_no_effect() {
        let harness = TestHarness::new();
        let gateway = Gateway::new(harness.services.clone());
        let processor = EventProcessor::new(harness.services.clone());

        gateway
            .intake(delivery("d-1"), "sponsorship", "{}".to_string(), true)
            .await
            .expect("intake");
        harness.run_processing(&processor).await;

        let event = harness
            .store
            .get_raw_event(&delivery("d-1"))
            .await
            .expect("get")
            .expect("present");
        assert_eq!(event.process_state, ProcessState::Processed);
    }

    #[tokio::test]
    async fn test_retry_sweep_schedules_due_events() {
        let harness = TestHarness::new();
        let processor = EventProcessor::new(harness.services.clone());
        let gateway = Gateway::new(harness.services.clone());

        gateway
            .intake(delivery("d-1"), "issues", "{}".to_string(), true)
            .await
            .expect("intake");
        harness.scheduler.drain();
        // Force the row into retry with a due timestamp.
        harness
            .store
            .transition_raw_event(
                &delivery("d-1"),
                &[ProcessState::Pending],
                ProcessState::Retry,
                Some("transient".to_string()),
                1,
                Some(Timestamp::from_millis(0)),
            )
            .await
            .expect("transition");

        let scheduled = processor.run_retry_sweep().await.expect("sweep");
        assert_eq!(scheduled, 1);
        assert_eq!(harness.scheduler.queued_len(), 1);
    }

    #[tokio::test]
    async fn test_dead_letter_sweep_graduates_old_failed_events() {
        let harness = TestHarness::new();
        let processor = EventProcessor::new(harness.services.clone());
        let gateway = Gateway::new(harness.services.clone());

        gateway
            .intake(delivery("d-old"), "issues", "{}".to_string(), true)
            .await
            .expect("intake");
        harness
            .store
            .transition_raw_event(
                &delivery("d-old"),
                &[ProcessState::Pending],
                ProcessState::Failed,
                Some("exhausted".to_string()),
                5,
                None,
            )
            .await
            .expect("transition");

        // Advance past the dead-letter age.
        harness
            .clock
            .advance(harness.services.config.dead_letter_age_ms as i64 + 1_000);

        let graduated = processor.run_dead_letter_sweep().await.expect("sweep");
        assert_eq!(graduated, 1);

        assert!(harness
            .store
            .get_raw_event(&delivery("d-old"))
            .await
            .expect("get")
            .is_none());
        let letters = harness.store.list_dead_letters(10).await.expect("list");
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].reason, "max-attempts-exceeded");
        assert!(matches!(letters[0].source, DeadLetterSource::Webhook));
    }

    #[tokio::test]
    async fn test_fresh_failed_events_are_not_dead_lettered() {
        let harness = TestHarness::new();
        let processor = EventProcessor::new(harness.services.clone());
        let gateway = Gateway::new(harness.services.clone());

        gateway
            .intake(delivery("d-new"), "issues", "{}".to_string(), true)
            .await
            .expect("intake");
        harness
            .store
            .transition_raw_event(
                &delivery("d-new"),
                &[ProcessState::Pending],
                ProcessState::Failed,
                Some("exhausted".to_string()),
                5,
                None,
            )
            .await
            .expect("transition");

        assert_eq!(processor.run_dead_letter_sweep().await.expect("sweep"), 0);
        assert!(harness
            .store
            .get_raw_event(&delivery("d-new"))
            .await
            .expect("get")
            .is_some());
    }

    #[tokio::test]
    async fn test_replay_resets_processed_event_and_is_idempotent() {
        let harness = TestHarness::new();
        let gateway = Gateway::new(harness.services.clone());
        let processor = EventProcessor::new(harness.services.clone());

        gateway
            .intake(
                delivery("d-1"),
                "issues",
                payloads::issues_event(12345, "opened", 1, "T", "open", "2026-02-18T10:00:00Z"),
                true,
            )
            .await
            .expect("intake");
        harness.run_processing(&processor).await;

        // Reset and process again: exactly one issue row.
        assert!(processor.replay_delivery(&delivery("d-1")).await.expect("replay"));
        harness.run_processing(&processor).await;

        let page = harness
            .store
            .page_issues(
                RepositoryId::new(12345),
                None,
                ghmirror_store::Cursor::start(),
                100,
            )
            .await
            .expect("page");
        assert_eq!(page.page.len(), 1);
        assert_eq!(
            harness
                .store
                .get_raw_event(&delivery("d-1"))
                .await
                .expect("get")
                .expect("present")
                .process_state,
            ProcessState::Processed
        );
    }

    #[tokio::test]
    async fn test_retry_all_failed_resets_and_schedules() {
        let harness = TestHarness::new();
        let gateway = Gateway::new(harness.services.clone());
        let processor = EventProcessor::new(harness.services.clone());

        for id in ["d-1", "d-2"] {
            gateway
                .intake(delivery(id), "issues", "{}".to_string(), true)
                .await
                .expect("intake");
            harness
                .store
                .transition_raw_event(
                    &delivery(id),
                    &[ProcessState::Pending],
                    ProcessState::Failed,
                    Some("boom".to_string()),
                    5,
                    None,
                )
                .await
                .expect("transition");
        }
        harness.scheduler.drain();

        let count = processor.retry_all_failed().await.expect("retry all");
        assert_eq!(count, 2);
        assert_eq!(
            harness
                .store
                .count_raw_events_by_state(ProcessState::Pending)
                .await
                .expect("count"),
            2
        );
    }
}
