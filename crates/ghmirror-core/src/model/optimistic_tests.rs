//! Tests for the optimistic-state merge rules (monotonic confirmation).

use super::*;

fn corr(s: &str) -> CorrelationId {
    CorrelationId::new(s).expect("valid correlation id")
}

fn pending_meta() -> OptimisticMeta {
    OptimisticMeta::pending(
        corr("c1"),
        OptimisticOperation::CreateIssue,
        Timestamp::from_millis(1_000),
        None,
    )
}

#[test]
fn test_webhook_confirms_pending() {
    let merged = OptimisticMeta::merge(Some(&pending_meta()), None, Timestamp::from_millis(2_000))
        .expect("meta survives");
    assert_eq!(merged.state, OptimisticWriteState::Confirmed);
    assert_eq!(merged.updated_at, Timestamp::from_millis(2_000));
}

#[test]
fn test_webhook_confirms_accepted() {
    let accepted = pending_meta().accepted(Timestamp::from_millis(1_500));
    let merged = OptimisticMeta::merge(Some(&accepted), None, Timestamp::from_millis(2_000))
        .expect("meta survives");
    assert_eq!(merged.state, OptimisticWriteState::Confirmed);
}

#[test]
fn test_webhook_leaves_failed_untouched() {
    let failed = pending_meta().failed("merge conflict".to_string(), Some(409), Timestamp::from_millis(1_500));
    let merged = OptimisticMeta::merge(Some(&failed), None, Timestamp::from_millis(2_000))
        .expect("meta survives");
    assert_eq!(merged.state, OptimisticWriteState::Failed);
    assert_eq!(merged.error_status, Some(409));
}

#[test]
fn test_confirmed_never_reopens_for_same_correlation() {
    let confirmed = pending_meta().confirmed(Timestamp::from_millis(2_000));
    // A late coordinator patch with the same correlation must not regress.
    let late_accept = pending_meta().accepted(Timestamp::from_millis(2_500));
    let merged = OptimisticMeta::merge(
        Some(&confirmed),
        Some(late_accept),
        Timestamp::from_millis(2_500),
    )
    .expect("meta survives");
    assert_eq!(merged.state, OptimisticWriteState::Confirmed);

    // Repeated webhooks keep it confirmed.
    let merged = OptimisticMeta::merge(Some(&merged), None, Timestamp::from_millis(3_000))
        .expect("meta survives");
    assert_eq!(merged.state, OptimisticWriteState::Confirmed);
}

#[test]
fn test_new_correlation_replaces_confirmed_block() {
    let confirmed = pending_meta().confirmed(Timestamp::from_millis(2_000));
    let next_op = OptimisticMeta::pending(
        corr("c2"),
        OptimisticOperation::UpdateLabels,
        Timestamp::from_millis(3_000),
        None,
    );
    let merged = OptimisticMeta::merge(
        Some(&confirmed),
        Some(next_op.clone()),
        Timestamp::from_millis(3_000),
    )
    .expect("meta survives");
    assert_eq!(merged, next_op);
}

#[test]
fn test_plain_webhook_row_has_no_meta() {
    assert_eq!(
        OptimisticMeta::merge(None, None, Timestamp::from_millis(1_000)),
        None
    );
}
