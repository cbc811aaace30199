//! End-to-end bootstrap: connect a repository, let the workflow hydrate
//! the store, then run the queued file syncs.

mod common;

use common::Pipeline;
use ghmirror_core::bootstrap::{sync_pull_request_details, BootstrapGate, ConnectService};
use ghmirror_core::model::JobState;
use ghmirror_core::store::MetadataStore;
use ghmirror_core::testing::api_user;
use ghmirror_core::{JobId, RepositoryId, UserId};
use ghmirror_github::*;
use ghmirror_store::ScheduledTask;
use ghmirror_workflow::{InMemoryWorkflowEngine, StepRetryPolicy};
use std::sync::Arc;
use std::time::Duration;

const REPO: u64 = 12345;

fn seed_github(pipeline: &Pipeline) {
    let github = &pipeline.harness.github;
    *github.repo.lock().expect("lock") = Some(ApiRepo {
        id: REPO,
        name: "widgets".to_string(),
        full_name: "octo/widgets".to_string(),
        owner: api_user(1, "octo"),
        private: false,
        default_branch: Some("main".to_string()),
        visibility: Some("public".to_string()),
        stargazers_count: Some(3),
        updated_at: None,
    });
    github.branches.lock().expect("lock").push(ApiBranch {
        name: "main".to_string(),
        commit: ApiBranchCommit {
            sha: "sha-main".to_string(),
        },
        protected: true,
    });
    github.pulls.lock().expect("lock").push(ApiPull {
        id: 905,
        number: 5,
        title: "Add parser".to_string(),
        body: None,
        state: "open".to_string(),
        draft: false,
        user: Some(api_user(1001, "u")),
        head: ApiPullRef {
            sha: "sha-head".to_string(),
            ref_name: "feature".to_string(),
        },
        base: ApiPullRef {
            sha: "sha-base".to_string(),
            ref_name: "main".to_string(),
        },
        mergeable_state: None,
        merged_at: None,
        closed_at: None,
        updated_at: "2026-02-18T10:00:00Z".to_string(),
        labels: vec![],
    });
    github.pull_files.lock().expect("lock").insert(
        5,
        vec![ApiPullFile {
            filename: "src/lib.rs".to_string(),
            status: "modified".to_string(),
            additions: 12,
            deletions: 3,
            patch: Some("@@ -1 +1 @@".to_string()),
        }],
    );
}

async fn wait_for_terminal(pipeline: &Pipeline, job_id: JobId) -> JobState {
    for _ in 0..400 {
        let job = pipeline
            .harness
            .store
            .get_sync_job(job_id)
            .await
            .expect("get")
            .expect("present");
        if job.state.is_terminal() {
            return job.state;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("bootstrap never finished");
}

#[tokio::test]
async fn test_connect_bootstrap_and_file_sync() {
    let pipeline = Pipeline::new();
    seed_github(&pipeline);

    let engine = Arc::new(InMemoryWorkflowEngine::new(StepRetryPolicy::immediate(2)));
    let gate = BootstrapGate::new(pipeline.harness.services.clone(), engine);
    let connect = ConnectService::new(
        pipeline.harness.services.clone(),
        gate,
        "hook-secret".to_string(),
    );

    let outcome = connect
        .connect_repo("octo/widgets", UserId::new(1001))
        .await
        .expect("connect");
    assert!(outcome.job_created);
    let state = wait_for_terminal(&pipeline, outcome.job_id.expect("job id")).await;
    assert_eq!(state, JobState::Done);

    let store = &pipeline.harness.store;
    let repo = RepositoryId::new(REPO);
    assert!(store.get_branch(repo, "main").await.expect("get").is_some());
    let pull = store
        .get_pull_request(repo, 5)
        .await
        .expect("get")
        .expect("hydrated");
    assert_eq!(pull.head_sha, "sha-head");

    // Step 8 queued a file sync; run it the way the service sink would.
    let file_tasks: Vec<_> = pipeline
        .harness
        .scheduler
        .drain()
        .into_iter()
        .filter_map(|task| match task {
            ScheduledTask::SyncPullRequestFiles {
                repository_id,
                pull_number,
            } => Some((repository_id, pull_number)),
            _ => None,
        })
        .collect();
    assert_eq!(file_tasks, vec![(REPO, 5)]);
    for (repository_id, pull_number) in file_tasks {
        sync_pull_request_details(
            &pipeline.harness.services,
            RepositoryId::new(repository_id),
            pull_number,
        )
        .await
        .expect("file sync");
    }

    let files = store
        .list_pull_request_files(repo, 5)
        .await
        .expect("list");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename, "src/lib.rs");
    assert_eq!(files[0].head_sha, "sha-head");

    // Re-running the sync for the same head is a no-op (SHA identity).
    sync_pull_request_details(&pipeline.harness.services, repo, 5)
        .await
        .expect("idempotent sync");
    assert_eq!(
        store.list_pull_request_files(repo, 5).await.expect("list").len(),
        1
    );
}
