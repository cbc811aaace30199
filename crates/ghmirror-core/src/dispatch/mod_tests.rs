//! Tests for event routing and the domain writer's invariants.

use super::*;
use crate::model::{IssueState, JobState, ProcessState, RawEvent};
use crate::store::MetadataStore;
use crate::testing::{payloads, TestHarness};
use crate::{DeliveryId, Timestamp, UserId};

const REPO: u64 = 12345;

fn raw(delivery: &str, event_name: &str, action: Option<&str>, payload: String) -> RawEvent {
    RawEvent::pending(
        DeliveryId::new(delivery).expect("valid delivery id"),
        event_name.to_string(),
        action.map(String::from),
        None,
        Some(RepositoryId::new(REPO)),
        payload,
        Timestamp::from_millis(1_000),
    )
}

fn repo_id() -> RepositoryId {
    RepositoryId::new(REPO)
}

#[tokio::test]
async fn test_issue_opened_writes_issue_user_and_activity() {
    let harness = TestHarness::new();
    let dispatcher = Dispatcher::new(harness.services.clone());

    let event = raw(
        "d-1",
        "issues",
        Some("opened"),
        payloads::issues_event(REPO, "opened", 1, "T", "open", "2026-02-18T10:00:00Z"),
    );
    let outcome = dispatcher.dispatch(&event).await.expect("dispatch");
    assert!(matches!(
        outcome,
        DispatchOutcome::Handled {
            repository_id: Some(_),
            ..
        }
    ));

    let issue = harness
        .store
        .get_issue(repo_id(), 1)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(issue.title, "T");
    assert_eq!(issue.state, IssueState::Open);

    let user = harness
        .store
        .get_user(UserId::new(1001))
        .await
        .expect("get")
        .expect("sender upserted");
    assert_eq!(user.login, "u");

    let activity = harness
        .store
        .page_activity(repo_id(), ghmirror_store::Cursor::start(), 10)
        .await
        .expect("page");
    assert_eq!(activity.page.len(), 1);
    assert_eq!(activity.page[0].activity_type, "issue.opened");
    assert_eq!(activity.page[0].entity_number, Some(1));
}

#[tokio::test]
async fn test_auto_discovery_creates_stub_and_reconcile_job() {
    let harness = TestHarness::new();
    let dispatcher = Dispatcher::new(harness.services.clone());

    let event = raw(
        "d-1",
        "issues",
        Some("opened"),
        payloads::issues_event(REPO, "opened", 1, "T", "open", "2026-02-18T10:00:00Z"),
    );
    dispatcher.dispatch(&event).await.expect("dispatch");

    let repo = harness
        .store
        .get_repository(repo_id())
        .await
        .expect("get")
        .expect("stub created");
    assert_eq!(repo.full_name, "octo/widgets");

    let job = harness
        .store
        .find_sync_job_by_lock_key(&crate::model::LockKey::repo_reconcile(None, repo_id()))
        .await
        .expect("find")
        .expect("reconcile queued");
    assert_eq!(job.state, JobState::Pending);

    // The drain nudge was scheduled.
    let drains: Vec<_> = harness
        .scheduler
        .drain()
        .into_iter()
        .filter(|t| matches!(t, ghmirror_store::ScheduledTask::DrainInstallation { .. }))
        .collect();
    assert_eq!(drains.len(), 1);
}

#[tokio::test]
async fn test_out_of_order_pull_request_events_converge() {
    let harness = TestHarness::new();
    let dispatcher = Dispatcher::new(harness.services.clone());

    let closed = raw(
        "d-1",
        "pull_request",
        Some("closed"),
        payloads::pull_request_event(
            REPO,
            "closed",
            5,
            "Title at noon",
            "closed",
            "2026-02-18T12:00:00Z",
            None,
        ),
    );
    let opened_late = raw(
        "d-2",
        "pull_request",
        Some("opened"),
        payloads::pull_request_event(
            REPO,
            "opened",
            5,
            "Title at ten",
            "open",
            "2026-02-18T10:00:00Z",
            None,
        ),
    );

    dispatcher.dispatch(&closed).await.expect("dispatch");
    dispatcher.dispatch(&opened_late).await.expect("dispatch");

    let pull = harness
        .store
        .get_pull_request(repo_id(), 5)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(pull.state, crate::model::PrState::Closed);
    assert_eq!(pull.title, "Title at noon");
}

#[tokio::test]
async fn test_issue_comment_routes_by_pull_request_presence() {
    let harness = TestHarness::new();
    let dispatcher = Dispatcher::new(harness.services.clone());

    let on_issue = raw(
        "d-1",
        "issue_comment",
        Some("created"),
        payloads::issue_comment_event(REPO, "created", 1, 9001, "on an issue", false),
    );
    let on_pr = raw(
        "d-2",
        "issue_comment",
        Some("created"),
        payloads::issue_comment_event(REPO, "created", 2, 9002, "on a pr", true),
    );
    dispatcher.dispatch(&on_issue).await.expect("dispatch");
    dispatcher.dispatch(&on_pr).await.expect("dispatch");

    let activity = harness
        .store
        .page_activity(repo_id(), ghmirror_store::Cursor::start(), 10)
        .await
        .expect("page");
    let types: Vec<&str> = activity
        .page
        .iter()
        .map(|a| a.activity_type.as_str())
        .collect();
    assert!(types.contains(&"issue_comment.created"));
    assert!(types.contains(&"pr_comment.created"));
}

#[tokio::test]
async fn test_comment_deletion_is_idempotent() {
    let harness = TestHarness::new();
    let dispatcher = Dispatcher::new(harness.services.clone());

    let created = raw(
        "d-1",
        "issue_comment",
        Some("created"),
        payloads::issue_comment_event(REPO, "created", 1, 9001, "hello", false),
    );
    dispatcher.dispatch(&created).await.expect("dispatch");
    assert_eq!(
        harness.store.count_issue_comments(repo_id(), 1).await.expect("count"),
        1
    );

    let deleted = raw(
        "d-2",
        "issue_comment",
        Some("deleted"),
        payloads::issue_comment_event(REPO, "deleted", 1, 9001, "hello", false),
    );
    dispatcher.dispatch(&deleted).await.expect("dispatch");
    assert_eq!(
        harness.store.count_issue_comments(repo_id(), 1).await.expect("count"),
        0
    );

    // Deleting again is a no-op, not an error.
    let deleted_again = raw(
        "d-3",
        "issue_comment",
        Some("deleted"),
        payloads::issue_comment_event(REPO, "deleted", 1, 9001, "hello", false),
    );
    dispatcher.dispatch(&deleted_again).await.expect("dispatch");
}

#[tokio::test]
async fn test_push_updates_branch_commits_and_activity() {
    let harness = TestHarness::new();
    let dispatcher = Dispatcher::new(harness.services.clone());

    let push = raw("d-1", "push", None, payloads::push_event(REPO, "main", 2));
    let outcome = dispatcher.dispatch(&push).await.expect("dispatch");

    match outcome {
        DispatchOutcome::Handled { last_push_at, .. } => {
            assert!(last_push_at.is_some(), "push reports a last-push hint")
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let branch = harness
        .store
        .get_branch(repo_id(), "main")
        .await
        .expect("get")
        .expect("present");
    assert_eq!(branch.head_sha, "new-sha");
    assert!(harness
        .store
        .get_commit(repo_id(), "sha-0")
        .await
        .expect("get")
        .is_some());

    let activity = harness
        .store
        .page_activity(repo_id(), ghmirror_store::Cursor::start(), 10)
        .await
        .expect("page");
    assert_eq!(activity.page.len(), 1);
    assert_eq!(activity.page[0].activity_type, "push");
    assert_eq!(activity.page[0].title, "Pushed 2 commits to main");
}

#[tokio::test]
async fn test_check_run_activity_only_for_completed_conclusions() {
    let harness = TestHarness::new();
    let dispatcher = Dispatcher::new(harness.services.clone());

    let created = raw(
        "d-1",
        "check_run",
        Some("created"),
        payloads::check_run_event(REPO, "created", 42, "in_progress", None),
    );
    dispatcher.dispatch(&created).await.expect("dispatch");

    let completed = raw(
        "d-2",
        "check_run",
        Some("completed"),
        payloads::check_run_event(REPO, "completed", 42, "completed", Some("failure")),
    );
    dispatcher.dispatch(&completed).await.expect("dispatch");

    // Neutral conclusions stay out of the feed.
    let skipped = raw(
        "d-3",
        "check_run",
        Some("completed"),
        payloads::check_run_event(REPO, "completed", 43, "completed", Some("skipped")),
    );
    dispatcher.dispatch(&skipped).await.expect("dispatch");

    let activity = harness
        .store
        .page_activity(repo_id(), ghmirror_store::Cursor::start(), 10)
        .await
        .expect("page");
    assert_eq!(activity.page.len(), 1);
    assert_eq!(activity.page[0].activity_type, "check_run.failure");

    let counts = harness.store.repo_counts(repo_id()).await.expect("counts");
    assert_eq!(counts.failing_check_count, 1);
}

#[tokio::test]
async fn test_branch_delete_event_removes_branch() {
    let harness = TestHarness::new();
    let dispatcher = Dispatcher::new(harness.services.clone());

    let push = raw("d-1", "push", None, payloads::push_event(REPO, "feature", 1));
    dispatcher.dispatch(&push).await.expect("dispatch");
    assert!(harness
        .store
        .get_branch(repo_id(), "feature")
        .await
        .expect("get")
        .is_some());

    let delete_payload = serde_json::json!({
        "ref": "feature",
        "ref_type": "branch",
        "repository": payloads::repository(REPO),
        "sender": { "id": 1001, "login": "u" }
    })
    .to_string();
    let delete = raw("d-2", "delete", None, delete_payload);
    dispatcher.dispatch(&delete).await.expect("dispatch");
    assert!(harness
        .store
        .get_branch(repo_id(), "feature")
        .await
        .expect("get")
        .is_none());

    // Tag deletions are not routed to branch handling.
    let tag_payload = serde_json::json!({
        "ref": "v1.0.0",
        "ref_type": "tag",
        "repository": payloads::repository(REPO),
    })
    .to_string();
    let tag = raw("d-3", "delete", None, tag_payload);
    assert!(matches!(
        dispatcher.dispatch(&tag).await.expect("dispatch"),
        DispatchOutcome::Ignored
    ));
}

#[tokio::test]
async fn test_unroutable_events_are_ignored() {
    let harness = TestHarness::new();
    let dispatcher = Dispatcher::new(harness.services.clone());

    let unknown = raw("d-1", "sponsorship", Some("created"), "{}".to_string());
    assert!(matches!(
        dispatcher.dispatch(&unknown).await.expect("dispatch"),
        DispatchOutcome::Ignored
    ));

    let unknown_action = raw(
        "d-2",
        "issues",
        Some("milestoned"),
        payloads::issues_event(REPO, "milestoned", 1, "T", "open", "2026-02-18T10:00:00Z"),
    );
    assert!(matches!(
        dispatcher.dispatch(&unknown_action).await.expect("dispatch"),
        DispatchOutcome::Ignored
    ));

    let ping = raw("d-3", "ping", None, r#"{"zen":"Design for failure."}"#.to_string());
    assert!(matches!(
        dispatcher.dispatch(&ping).await.expect("dispatch"),
        DispatchOutcome::Ignored
    ));
}

#[tokio::test]
async fn test_replaying_a_delivery_does_not_duplicate_activity() {
    let harness = TestHarness::new();
    let dispatcher = Dispatcher::new(harness.services.clone());

    let event = raw(
        "d-1",
        "issues",
        Some("opened"),
        payloads::issues_event(REPO, "opened", 1, "T", "open", "2026-02-18T10:00:00Z"),
    );
    dispatcher.dispatch(&event).await.expect("dispatch");
    dispatcher.dispatch(&event).await.expect("dispatch");

    let activity = harness
        .store
        .page_activity(repo_id(), ghmirror_store::Cursor::start(), 10)
        .await
        .expect("page");
    assert_eq!(
        activity.page.len(),
        1,
        "delivery-keyed activity ids keep replay idempotent"
    );
}

#[tokio::test]
async fn test_malformed_payload_is_an_error() {
    let harness = TestHarness::new();
    let dispatcher = Dispatcher::new(harness.services.clone());

    let event = raw("d-1", "issues", Some("opened"), r#"{"action":"opened"}"#.to_string());
    let err = dispatcher.dispatch(&event).await.expect_err("must fail");
    assert!(matches!(err, MirrorError::MalformedPayload { .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_pull_request_synchronize_schedules_file_sync() {
    let harness = TestHarness::new();
    let dispatcher = Dispatcher::new(harness.services.clone());

    let sync = raw(
        "d-1",
        "pull_request",
        Some("synchronize"),
        payloads::pull_request_event(
            REPO,
            "synchronize",
            5,
            "PR",
            "open",
            "2026-02-18T10:00:00Z",
            None,
        ),
    );
    dispatcher.dispatch(&sync).await.expect("dispatch");

    let file_syncs: Vec<_> = harness
        .scheduler
        .drain()
        .into_iter()
        .filter(|t| {
            matches!(
                t,
                ghmirror_store::ScheduledTask::SyncPullRequestFiles { pull_number: 5, .. }
            )
        })
        .collect();
    assert_eq!(file_syncs.len(), 1);
}

#[tokio::test]
async fn test_raw_event_state_machine_is_unchanged_by_dispatch() {
    // The dispatcher never touches process_state; that belongs to the
    // processor. Guard against accidental coupling.
    let harness = TestHarness::new();
    let dispatcher = Dispatcher::new(harness.services.clone());

    let event = raw(
        "d-1",
        "issues",
        Some("opened"),
        payloads::issues_event(REPO, "opened", 1, "T", "open", "2026-02-18T10:00:00Z"),
    );
    harness
        .store
        .insert_raw_event(event.clone())
        .await
        .expect("insert");
    dispatcher.dispatch(&event).await.expect("dispatch");

    let stored = harness
        .store
        .get_raw_event(&event.delivery_id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(stored.process_state, ProcessState::Pending);
}
