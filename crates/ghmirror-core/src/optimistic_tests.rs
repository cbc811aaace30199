//! Tests for the optimistic write coordinator.

use super::*;
use crate::services::Clock;
use crate::store::MetadataStore;
use crate::testing::TestHarness;

fn corr(s: &str) -> CorrelationId {
    CorrelationId::new(s).expect("valid correlation id")
}

fn repo_row(harness: &TestHarness) -> Repository {
    Repository {
        repository_id: RepositoryId::new(12345),
        installation_id: None,
        owner_login: "octo".to_string(),
        name: "widgets".to_string(),
        full_name: "octo/widgets".to_string(),
        default_branch: "main".to_string(),
        private: false,
        visibility: Visibility::Public,
        connected_by_user_id: Some(UserId::new(1001)),
        stargazers_count: None,
        cached_at: harness.clock.now(),
        github_updated_at: None,
    }
}

async fn seed_repo(harness: &TestHarness) -> RepositoryId {
    let repo = repo_row(harness);
    let id = repo.repository_id;
    harness.store.upsert_repository(repo).await.expect("repo");
    id
}

async fn seed_issue(harness: &TestHarness, number: u64) {
    let issue = Issue {
        doc_id: new_doc_id(),
        repository_id: RepositoryId::new(12345),
        number: Some(number),
        github_issue_id: Some(5_000 + number),
        state: IssueState::Open,
        title: "T".to_string(),
        body: None,
        author_user_id: None,
        author_login: None,
        label_names: vec!["bug".to_string()],
        assignee_user_ids: vec![],
        is_pull_request: false,
        created_at: harness.clock.now(),
        closed_at: None,
        github_updated_at: Some(harness.clock.now()),
        optimistic: None,
    };
    harness
        .store
        .upsert_issue(issue, harness.clock.now())
        .await
        .expect("issue");
}

#[tokio::test]
async fn test_create_issue_optimistic_then_accepted() {
    let harness = TestHarness::new();
    let repo = seed_repo(&harness).await;
    let coordinator = OptimisticCoordinator::new(harness.services.clone());

    let outcome = coordinator
        .create_issue(repo, UserId::new(1001), corr("c1"), "X".to_string())
        .await
        .expect("create");

    assert_eq!(outcome.state, OptimisticWriteState::Accepted);
    assert_eq!(outcome.entity_number, Some(99));

    let issue = harness
        .store
        .get_issue(repo, 99)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(issue.title, "X");
    let meta = issue.optimistic.expect("meta");
    assert_eq!(meta.state, OptimisticWriteState::Accepted);
    assert_eq!(meta.correlation_id.as_str(), "c1");
    assert_eq!(meta.operation, OptimisticOperation::CreateIssue);
}

#[tokio::test]
async fn test_duplicate_correlation_is_rejected_without_github_call() {
    let harness = TestHarness::new();
    let repo = seed_repo(&harness).await;
    let coordinator = OptimisticCoordinator::new(harness.services.clone());

    coordinator
        .create_issue(repo, UserId::new(1001), corr("c1"), "X".to_string())
        .await
        .expect("first create");
    let calls_before = harness.github.calls.lock().expect("lock").len();

    let err = coordinator
        .create_issue(repo, UserId::new(1001), corr("c1"), "X again".to_string())
        .await
        .expect_err("duplicate must fail");
    assert!(matches!(err, MirrorError::DuplicateOperation { .. }));

    // No further GitHub traffic for the duplicate.
    assert_eq!(
        harness.github.calls.lock().expect("lock").len(),
        calls_before
    );

    // Exactly one row bears the correlation.
    let page = harness
        .store
        .page_issues(repo, None, ghmirror_store::Cursor::start(), 100)
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

#[tokio::test]
async fn test_rejected_write_marks_failed_without_rollback() {
    let harness = TestHarness::new();
    let repo = seed_repo(&harness).await;
    seed_issue(&harness, 7).await;
    harness.github.reject_next_writes(422, "validation failed");
    let coordinator = OptimisticCoordinator::new(harness.services.clone());

    let outcome = coordinator
        .update_issue_state(repo, UserId::new(1001), corr("c2"), 7, IssueState::Closed)
        .await
        .expect("operation completes");

    assert_eq!(outcome.state, OptimisticWriteState::Failed);
    assert_eq!(outcome.error_status, Some(422));
    assert!(outcome.error_message.expect("message").contains("validation"));

    // The optimistic effect stays; the client decides what to do.
    let issue = harness
        .store
        .get_issue(repo, 7)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(issue.state, IssueState::Closed);
    let meta = issue.optimistic.expect("meta");
    assert_eq!(meta.state, OptimisticWriteState::Failed);
    assert_eq!(meta.error_status, Some(422));
}

#[tokio::test]
async fn test_merge_pull_request_sets_closed_and_merged() {
    let harness = TestHarness::new();
    let repo = seed_repo(&harness).await;
    let pull = PullRequest {
        repository_id: repo,
        number: 5,
        github_pr_id: 905,
        title: "Add parser".to_string(),
        state: PrState::Open,
        draft: false,
        author_user_id: None,
        author_login: None,
        head_sha: "abc".to_string(),
        head_ref_name: "feature".to_string(),
        base_ref_name: "main".to_string(),
        mergeable_state: Some("clean".to_string()),
        merged_at: None,
        closed_at: None,
        created_at: harness.clock.now(),
        github_updated_at: Some(harness.clock.now()),
        optimistic: None,
    };
    harness
        .store
        .upsert_pull_request(pull, harness.clock.now())
        .await
        .expect("pr");

    let coordinator = OptimisticCoordinator::new(harness.services.clone());
    let outcome = coordinator
        .merge_pull_request(
            repo,
            UserId::new(1001),
            corr("c3"),
            5,
            Some("squash".to_string()),
        )
        .await
        .expect("merge");

    assert_eq!(outcome.state, OptimisticWriteState::Accepted);
    let stored = harness
        .store
        .get_pull_request(repo, 5)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(stored.state, PrState::Closed);
    assert!(stored.merged_at.is_some());
    assert_eq!(stored.head_sha, "merge-sha");
    assert_eq!(
        stored.optimistic.expect("meta").state,
        OptimisticWriteState::Accepted
    );
}

#[tokio::test]
async fn test_update_labels_recomputes_label_names() {
    let harness = TestHarness::new();
    let repo = seed_repo(&harness).await;
    seed_issue(&harness, 7).await;
    let coordinator = OptimisticCoordinator::new(harness.services.clone());

    let outcome = coordinator
        .update_labels(
            repo,
            UserId::new(1001),
            corr("c4"),
            7,
            vec!["urgent".to_string(), "bug".to_string()],
            vec![],
        )
        .await
        .expect("labels");
    assert_eq!(outcome.state, OptimisticWriteState::Accepted);

    let issue = harness
        .store
        .get_issue(repo, 7)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(issue.label_names, vec!["bug".to_string(), "urgent".to_string()]);

    // Remove path.
    let outcome = coordinator
        .update_labels(
            repo,
            UserId::new(1001),
            corr("c5"),
            7,
            vec![],
            vec!["bug".to_string()],
        )
        .await
        .expect("labels");
    assert_eq!(outcome.state, OptimisticWriteState::Accepted);
    let issue = harness
        .store
        .get_issue(repo, 7)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(issue.label_names, vec!["urgent".to_string()]);
}

#[tokio::test]
async fn test_update_assignees_resolves_logins_to_ids() {
    let harness = TestHarness::new();
    let repo = seed_repo(&harness).await;
    seed_issue(&harness, 7).await;
    harness
        .store
        .upsert_user(User {
            user_id: UserId::new(2002),
            login: "reviewer".to_string(),
            avatar_url: None,
            user_type: UserType::User,
            cached_at: harness.clock.now(),
        })
        .await
        .expect("user");
    // The fake needs the issue on its side for the assignee endpoints.
    harness.github.issues.lock().expect("lock").push(
        ghmirror_github::ApiIssue {
            id: 5007,
            number: 7,
            title: "T".to_string(),
            body: None,
            state: "open".to_string(),
            user: None,
            labels: vec![],
            assignees: vec![],
            pull_request: None,
            created_at: None,
            updated_at: "2026-02-18T10:00:00Z".to_string(),
            closed_at: None,
        },
    );

    let coordinator = OptimisticCoordinator::new(harness.services.clone());
    let outcome = coordinator
        .update_assignees(
            repo,
            UserId::new(1001),
            corr("c6"),
            7,
            vec!["reviewer".to_string()],
            vec![],
        )
        .await
        .expect("assignees");
    assert_eq!(outcome.state, OptimisticWriteState::Accepted);

    let issue = harness
        .store
        .get_issue(repo, 7)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(issue.assignee_user_ids, vec![UserId::new(2002)]);
}

#[tokio::test]
async fn test_create_comment_stub_then_accepted() {
    let harness = TestHarness::new();
    let repo = seed_repo(&harness).await;
    seed_issue(&harness, 7).await;
    let coordinator = OptimisticCoordinator::new(harness.services.clone());

    let outcome = coordinator
        .create_comment(
            repo,
            UserId::new(1001),
            corr("c7"),
            7,
            "looks good".to_string(),
        )
        .await
        .expect("comment");
    assert_eq!(outcome.state, OptimisticWriteState::Accepted);

    assert_eq!(
        harness.store.count_issue_comments(repo, 7).await.expect("count"),
        1
    );
}
