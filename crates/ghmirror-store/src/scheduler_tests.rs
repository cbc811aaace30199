//! Tests for the scheduler implementations.

use super::*;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

struct RecordingSink {
    seen: AsyncMutex<Vec<ScheduledTask>>,
    notify: tokio::sync::Notify,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            seen: AsyncMutex::new(Vec::new()),
            notify: tokio::sync::Notify::new(),
        }
    }
}

#[async_trait]
impl TaskSink for RecordingSink {
    async fn run(&self, task: ScheduledTask) {
        self.seen.lock().await.push(task);
        self.notify.notify_one();
    }
}

#[tokio::test]
async fn test_tokio_scheduler_delivers_task_to_sink() {
    let (scheduler, receiver) = TokioScheduler::new();
    let sink = Arc::new(RecordingSink::new());
    let _worker = TokioScheduler::spawn_worker(receiver, sink.clone());

    scheduler
        .run_after(
            Duration::ZERO,
            ScheduledTask::ProcessRawEvent {
                delivery_id: "d-1".to_string(),
            },
        )
        .await
        .expect("enqueue");

    sink.notify.notified().await;
    let seen = sink.seen.lock().await;
    assert_eq!(
        seen.as_slice(),
        [ScheduledTask::ProcessRawEvent {
            delivery_id: "d-1".to_string()
        }]
    );
}

#[tokio::test]
async fn test_tokio_scheduler_honors_delay_ordering_for_zero_delay() {
    let (scheduler, receiver) = TokioScheduler::new();
    let sink = Arc::new(RecordingSink::new());
    let _worker = TokioScheduler::spawn_worker(receiver, sink.clone());

    for installation_id in [Some(1u64), Some(2), None] {
        scheduler
            .run_after(
                Duration::ZERO,
                ScheduledTask::DrainInstallation { installation_id },
            )
            .await
            .expect("enqueue");
    }

    for _ in 0..3 {
        sink.notify.notified().await;
    }
    assert_eq!(sink.seen.lock().await.len(), 3);
}

#[tokio::test]
async fn test_manual_scheduler_records_and_drains() {
    let scheduler = ManualScheduler::new();
    scheduler
        .run_after(
            Duration::from_secs(30),
            ScheduledTask::SyncPullRequestFiles {
                repository_id: 12345,
                pull_number: 7,
            },
        )
        .await
        .expect("enqueue");

    assert_eq!(scheduler.queued_len(), 1);
    let drained = scheduler.drain();
    assert_eq!(
        drained,
        [ScheduledTask::SyncPullRequestFiles {
            repository_id: 12345,
            pull_number: 7,
        }]
    );
    assert_eq!(scheduler.queued_len(), 0);
}
