//! Tests for raw-event construction and state helpers.

use super::*;

fn delivery(id: &str) -> DeliveryId {
    DeliveryId::new(id).expect("valid delivery id")
}

#[test]
fn test_pending_row_defaults() {
    let event = RawEvent::pending(
        delivery("d-1"),
        "issues".to_string(),
        Some("opened".to_string()),
        None,
        Some(RepositoryId::new(12345)),
        "{}".to_string(),
        Timestamp::from_millis(1_000),
    );
    assert_eq!(event.process_state, ProcessState::Pending);
    assert_eq!(event.process_attempts, 0);
    assert!(event.signature_valid);
    assert!(event.next_retry_at.is_none());
}

#[test]
fn test_signature_failure_row_is_terminal_audit() {
    let event = RawEvent::signature_failure(
        delivery("d-2"),
        "push".to_string(),
        "{}".to_string(),
        Timestamp::from_millis(1_000),
    );
    assert!(!event.signature_valid);
    assert_eq!(event.process_state, ProcessState::Failed);
    assert!(!event.process_state.is_processable());
}

#[test]
fn test_processable_states() {
    assert!(ProcessState::Pending.is_processable());
    assert!(ProcessState::Retry.is_processable());
    assert!(!ProcessState::Processed.is_processable());
    assert!(!ProcessState::Failed.is_processable());
}

#[test]
fn test_state_ranks_are_distinct() {
    let ranks = [
        ProcessState::Pending.rank(),
        ProcessState::Retry.rank(),
        ProcessState::Processed.rank(),
        ProcessState::Failed.rank(),
    ];
    let mut deduped = ranks.to_vec();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(deduped.len(), ranks.len());
}

#[test]
fn test_bootstrap_dead_letter_id_format() {
    let id = DeadLetter::bootstrap_delivery_id("pulls", RepositoryId::new(12345), "page-3");
    assert_eq!(id, "bootstrap-pulls:12345:page-3");
}
