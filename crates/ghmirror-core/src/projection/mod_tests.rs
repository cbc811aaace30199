//! Tests for the overview projection builder.

use super::*;
use crate::services::Clock;
use crate::model::*;
use crate::store::MetadataStore;
use crate::testing::TestHarness;
use crate::RepositoryId;

fn repo_id() -> RepositoryId {
    RepositoryId::new(12345)
}

async fn seed_open_pull(harness: &TestHarness, number: u64) {
    let pull = PullRequest {
        repository_id: repo_id(),
        number,
        github_pr_id: 900 + number,
        title: format!("PR {}", number),
        state: PrState::Open,
        draft: false,
        author_user_id: None,
        author_login: None,
        head_sha: "abc".to_string(),
        head_ref_name: "feature".to_string(),
        base_ref_name: "main".to_string(),
        mergeable_state: None,
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
}

#[tokio::test]
async fn test_rebuild_computes_counts_from_aggregates() {
    let harness = TestHarness::new();
    seed_open_pull(&harness, 1).await;
    seed_open_pull(&harness, 2).await;

    let builder = ProjectionBuilder::new(harness.services.clone());
    builder.rebuild(repo_id(), None).await.expect("rebuild");

    let overview = harness
        .store
        .get_overview(repo_id())
        .await
        .expect("get")
        .expect("present");
    assert_eq!(overview.open_pr_count, 2);
    assert_eq!(overview.open_issue_count, 0);
    assert_eq!(overview.failing_check_count, 0);
    assert_eq!(overview.last_push_at, None);
}

#[tokio::test]
async fn test_last_push_at_only_moves_forward() {
    let harness = TestHarness::new();
    let builder = ProjectionBuilder::new(harness.services.clone());

    builder
        .rebuild(repo_id(), Some(Timestamp::from_millis(10_000)))
        .await
        .expect("rebuild");
    // A rebuild without a hint (or with an older one) keeps the high-water
    // mark.
    builder.rebuild(repo_id(), None).await.expect("rebuild");
    builder
        .rebuild(repo_id(), Some(Timestamp::from_millis(5_000)))
        .await
        .expect("rebuild");

    let overview = harness
        .store
        .get_overview(repo_id())
        .await
        .expect("get")
        .expect("present");
    assert_eq!(overview.last_push_at, Some(Timestamp::from_millis(10_000)));

    builder
        .rebuild(repo_id(), Some(Timestamp::from_millis(20_000)))
        .await
        .expect("rebuild");
    let overview = harness
        .store
        .get_overview(repo_id())
        .await
        .expect("get")
        .expect("present");
    assert_eq!(overview.last_push_at, Some(Timestamp::from_millis(20_000)));
}

#[tokio::test]
async fn test_concurrent_rebuilds_are_idempotent() {
    let harness = TestHarness::new();
    seed_open_pull(&harness, 1).await;
    let builder = ProjectionBuilder::new(harness.services.clone());

    builder.rebuild(repo_id(), None).await.expect("rebuild");
    let first = harness
        .store
        .get_overview(repo_id())
        .await
        .expect("get")
        .expect("present");
    builder.rebuild(repo_id(), None).await.expect("rebuild");
    let second = harness
        .store
        .get_overview(repo_id())
        .await
        .expect("get")
        .expect("present");

    assert_eq!(first.open_pr_count, second.open_pr_count);
    assert_eq!(first.last_push_at, second.last_push_at);
}

#[tokio::test]
async fn test_overview_read_computes_when_missing() {
    let harness = TestHarness::new();
    seed_open_pull(&harness, 1).await;
    let builder = ProjectionBuilder::new(harness.services.clone());

    let overview = builder.overview(repo_id()).await.expect("overview");
    assert_eq!(overview.open_pr_count, 1);
}
