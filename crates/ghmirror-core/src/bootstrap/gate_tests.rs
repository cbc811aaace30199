//! Tests for the concurrency gate: cap enforcement, drain, and completion
//! bookkeeping, run against the in-memory workflow engine.

use super::*;
use crate::services::Clock;
use crate::config::MirrorConfig;
use crate::model::*;
use crate::store::MetadataStore;
use crate::testing::TestHarness;
use crate::{InstallationId, RepositoryId, UserId};
use ghmirror_workflow::{InMemoryWorkflowEngine, StepRetryPolicy};
use std::time::Duration;

fn capped_config(cap: u32) -> MirrorConfig {
    MirrorConfig {
        bootstrap_max_per_installation: cap,
        ..crate::testing::test_config()
    }
}

async fn seed_repo(harness: &TestHarness, repo_id: u64, installation: Option<u64>) {
    harness
        .store
        .upsert_repository(Repository {
            repository_id: RepositoryId::new(repo_id),
            installation_id: installation.map(InstallationId::new),
            owner_login: "octo".to_string(),
            name: format!("repo-{}", repo_id),
            full_name: format!("octo/repo-{}", repo_id),
            default_branch: "main".to_string(),
            private: false,
            visibility: Visibility::Public,
            connected_by_user_id: Some(UserId::new(1001)),
            stargazers_count: None,
            cached_at: harness.clock.now(),
            github_updated_at: None,
        })
        .await
        .expect("repo");
}

async fn create_job(harness: &TestHarness, repo_id: u64, installation: Option<u64>) -> SyncJob {
    let job = SyncJob::for_repository(
        JobType::Backfill,
        "test",
        installation.map(InstallationId::new),
        RepositoryId::new(repo_id),
        0,
        harness.clock.now(),
    );
    harness.store.create_sync_job(job.clone()).await.expect("create");
    job
}

fn gate_for(harness: &TestHarness) -> BootstrapGate {
    let engine = std::sync::Arc::new(InMemoryWorkflowEngine::new(StepRetryPolicy::immediate(2)));
    BootstrapGate::new(harness.services.clone(), engine)
}

async fn wait_for_state(harness: &TestHarness, job_id: crate::JobId, state: JobState) -> SyncJob {
    for _ in 0..200 {
        let job = harness
            .store
            .get_sync_job(job_id)
            .await
            .expect("get")
            .expect("present");
        if job.state == state {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {} never reached {:?}", job_id, state);
}

#[tokio::test]
async fn test_start_respects_installation_cap_and_drains_on_completion() {
    let harness = TestHarness::with_config(capped_config(1));
    seed_repo(&harness, 1, Some(7)).await;
    seed_repo(&harness, 2, Some(7)).await;
    let first = create_job(&harness, 1, Some(7)).await;
    let second = create_job(&harness, 2, Some(7)).await;
    let gate = gate_for(&harness);

    // Claim the only slot synchronously so the second start observes a
    // full installation regardless of how fast the first workflow runs.
    assert_eq!(
        harness
            .store
            .claim_sync_job(first.job_id, 1, harness.clock.now())
            .await
            .expect("claim"),
        crate::store::ClaimOutcome::Claimed
    );
    assert_eq!(
        gate.start_job(second.job_id).await.expect("start"),
        StartOutcome::Deferred
    );

    // Release the slot the way the engine would, then drain.
    harness
        .store
        .complete_sync_job(first.job_id, JobState::Done, None, harness.clock.now())
        .await
        .expect("complete");
    assert_eq!(gate.drain(Some(InstallationId::new(7))).await.expect("drain"), 1);

    // With an empty FakeGithub the workflow finishes quickly.
    let done = wait_for_state(&harness, second.job_id, JobState::Done).await;
    assert!(done.last_error.is_none());
}

#[tokio::test]
async fn test_completed_workflow_marks_job_done() {
    let harness = TestHarness::new();
    seed_repo(&harness, 1, Some(7)).await;
    let job = create_job(&harness, 1, Some(7)).await;
    let gate = gate_for(&harness);

    assert_eq!(
        gate.start_job(job.job_id).await.expect("start"),
        StartOutcome::Started
    );
    let done = wait_for_state(&harness, job.job_id, JobState::Done).await;
    assert!(done.state.is_terminal());

    // The lock key is released: a reconcile-style rerun can be created.
    let rerun = create_job(&harness, 1, Some(7)).await;
    assert_eq!(rerun.lock_key, job.lock_key);
}

#[tokio::test]
async fn test_failed_workflow_marks_job_failed_and_dead_letters() {
    let harness = TestHarness::new();
    // Repository row missing → load-repository fails permanently.
    let job = create_job(&harness, 999, Some(7)).await;
    let gate = gate_for(&harness);

    assert_eq!(
        gate.start_job(job.job_id).await.expect("start"),
        StartOutcome::Started
    );
    let failed = wait_for_state(&harness, job.job_id, JobState::Failed).await;
    assert!(failed
        .last_error
        .as_deref()
        .expect("error recorded")
        .contains("load-repository"));

    let letters = harness.store.list_dead_letters(10).await.expect("letters");
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].delivery_id, format!("workflow:{}", job.job_id));
    assert!(matches!(letters[0].source, DeadLetterSource::Bootstrap));
}

#[tokio::test]
async fn test_start_job_is_noop_for_non_pending() {
    let harness = TestHarness::new();
    seed_repo(&harness, 1, Some(7)).await;
    let job = create_job(&harness, 1, Some(7)).await;
    harness
        .store
        .complete_sync_job(job.job_id, JobState::Failed, Some("x".to_string()), harness.clock.now())
        .await
        .expect("complete");
    let gate = gate_for(&harness);

    assert_eq!(
        gate.start_job(job.job_id).await.expect("start"),
        StartOutcome::NotPending
    );
}
