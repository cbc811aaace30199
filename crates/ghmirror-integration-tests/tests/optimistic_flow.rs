//! Optimistic write scenarios: create, confirm via webhook, duplicate
//! correlation.

mod common;

use common::Pipeline;
use ghmirror_core::model::{OptimisticWriteState, Repository};
use ghmirror_core::Clock;
use ghmirror_core::optimistic::OptimisticCoordinator;
use ghmirror_core::store::MetadataStore;
use ghmirror_core::testing::payloads;
use ghmirror_core::{CorrelationId, MirrorError, RepositoryId, UserId};
use ghmirror_store::Cursor;

const REPO: u64 = 12345;

fn corr(s: &str) -> CorrelationId {
    CorrelationId::new(s).expect("valid correlation id")
}

async fn seed_connected_repo(pipeline: &Pipeline) {
    let mut repo = Repository::stub(
        RepositoryId::new(REPO),
        None,
        "octo".to_string(),
        "widgets".to_string(),
        "octo/widgets".to_string(),
        pipeline.harness.clock.now(),
    );
    repo.connected_by_user_id = Some(UserId::new(1001));
    pipeline
        .harness
        .store
        .upsert_repository(repo)
        .await
        .expect("repo");
}

/// Scenario: `createIssue(corr=c1)` writes a pending stub, the accept path
/// records number 99, and the confirming webhook flips the same row to
/// `confirmed`.
#[tokio::test]
async fn test_optimistic_create_then_webhook_confirm() {
    let pipeline = Pipeline::new();
    seed_connected_repo(&pipeline).await;
    let coordinator = OptimisticCoordinator::new(pipeline.harness.services.clone());

    let outcome = coordinator
        .create_issue(
            RepositoryId::new(REPO),
            UserId::new(1001),
            corr("c1"),
            "X".to_string(),
        )
        .await
        .expect("create");
    assert_eq!(outcome.state, OptimisticWriteState::Accepted);
    assert_eq!(outcome.entity_number, Some(99));

    // The stub is visible to reads before any webhook arrives.
    let accepted = pipeline
        .harness
        .store
        .get_issue(RepositoryId::new(REPO), 99)
        .await
        .expect("get")
        .expect("accepted row");
    assert_eq!(
        accepted.optimistic.as_ref().expect("meta").state,
        OptimisticWriteState::Accepted
    );

    // Confirming webhook for issue #99.
    pipeline
        .deliver(
            "d-confirm",
            "issues",
            payloads::issues_event(REPO, "opened", 99, "X", "open", "2026-02-18T10:01:00Z"),
        )
        .await;

    let page = pipeline
        .harness
        .store
        .page_issues(RepositoryId::new(REPO), None, Cursor::start(), 100)
        .await
        .expect("page");
    assert_eq!(page.page.len(), 1, "stub and webhook row merged into one");
    let issue = &page.page[0];
    assert_eq!(issue.number, Some(99));
    let meta = issue.optimistic.as_ref().expect("meta survives");
    assert_eq!(meta.correlation_id.as_str(), "c1");
    assert_eq!(meta.state, OptimisticWriteState::Confirmed);

    // Later webhooks must not reopen the state.
    pipeline
        .deliver(
            "d-later",
            "issues",
            payloads::issues_event(REPO, "edited", 99, "X2", "open", "2026-02-18T10:05:00Z"),
        )
        .await;
    let issue = pipeline
        .harness
        .store
        .get_issue(RepositoryId::new(REPO), 99)
        .await
        .expect("get")
        .expect("row");
    assert_eq!(
        issue.optimistic.as_ref().expect("meta").state,
        OptimisticWriteState::Confirmed
    );
    assert_eq!(issue.title, "X2");
}

/// Scenario: two sequential `createIssue` calls with the same correlation
/// id — the second fails and exactly one row bears the correlation.
#[tokio::test]
async fn test_duplicate_correlation_rejected() {
    let pipeline = Pipeline::new();
    seed_connected_repo(&pipeline).await;
    let coordinator = OptimisticCoordinator::new(pipeline.harness.services.clone());

    let first = coordinator
        .create_issue(
            RepositoryId::new(REPO),
            UserId::new(1001),
            corr("c1"),
            "X".to_string(),
        )
        .await
        .expect("first create");
    assert_eq!(first.state, OptimisticWriteState::Accepted);

    let err = coordinator
        .create_issue(
            RepositoryId::new(REPO),
            UserId::new(1001),
            corr("c1"),
            "X again".to_string(),
        )
        .await
        .expect_err("second must fail");
    assert!(matches!(err, MirrorError::DuplicateOperation { .. }));

    let page = pipeline
        .harness
        .store
        .page_issues(RepositoryId::new(REPO), None, Cursor::start(), 100)
        .await
        .expect("page");
    let bearing: Vec<_> = page
        .page
        .iter()
        .filter(|i| {
            i.optimistic
                .as_ref()
                .map(|m| m.correlation_id.as_str() == "c1")
                .unwrap_or(false)
        })
        .collect();
    assert_eq!(bearing.len(), 1);
}

/// A rejected GitHub write leaves the optimistic row failed but intact;
/// the client retries with a fresh correlation id and succeeds.
#[tokio::test]
async fn test_failed_write_then_retry_with_fresh_correlation() {
    let pipeline = Pipeline::new();
    seed_connected_repo(&pipeline).await;
    let coordinator = OptimisticCoordinator::new(pipeline.harness.services.clone());

    pipeline.harness.github.reject_next_writes(403, "forbidden");
    let failed = coordinator
        .create_issue(
            RepositoryId::new(REPO),
            UserId::new(1001),
            corr("c1"),
            "X".to_string(),
        )
        .await
        .expect("operation completes");
    assert_eq!(failed.state, OptimisticWriteState::Failed);

    *pipeline.harness.github.reject_writes.lock().expect("lock") = None;
    let retried = coordinator
        .create_issue(
            RepositoryId::new(REPO),
            UserId::new(1001),
            corr("c2"),
            "X".to_string(),
        )
        .await
        .expect("retry succeeds");
    assert_eq!(retried.state, OptimisticWriteState::Accepted);
}
