//! `run_after` scheduling contract.
//!
//! The document store collaborator provides at-least-once deferred
//! execution. The contract here is deliberately narrow: callers enqueue a
//! [`ScheduledTask`] value with a delay, and some worker eventually hands it
//! to the process-wide [`TaskSink`]. Tasks carry ids, never closures, so a
//! durable scheduler can journal them.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// A unit of deferred work. Variants carry only identifiers; the sink
/// resolves them against live services when the task fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledTask {
    /// Run one processing attempt for a raw webhook event.
    ProcessRawEvent { delivery_id: String },

    /// Fetch and store the file diff set for one pull request.
    SyncPullRequestFiles { repository_id: u64, pull_number: u64 },

    /// Start as many pending sync jobs for an installation as the
    /// concurrency gate allows. `None` drains the pool of jobs that have no
    /// installation.
    DrainInstallation { installation_id: Option<u64> },
}

/// Errors surfaced by [`Scheduler::run_after`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler worker has shut down")]
    Closed,
}

/// Consumer side of the scheduler: executes tasks when they come due.
#[async_trait]
pub trait TaskSink: Send + Sync {
    async fn run(&self, task: ScheduledTask);
}

/// Producer side: enqueue a task to run after `delay`.
///
/// Execution is at-least-once; sinks must be idempotent.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn run_after(&self, delay: Duration, task: ScheduledTask) -> Result<(), SchedulerError>;
}

// ============================================================================
// TokioScheduler
// ============================================================================

/// Receiver half returned by [`TokioScheduler::new`]; feed it to
/// [`TokioScheduler::spawn_worker`] during service wiring.
pub struct TaskReceiver {
    rx: mpsc::UnboundedReceiver<(Duration, ScheduledTask)>,
}

/// Tokio-backed scheduler: each task is a sleeping spawned future.
///
/// Split construction breaks the cycle between the scheduler (owned by the
/// services bundle) and the sink (which needs those services): the sender
/// half is cheap to clone into services, while the worker is spawned once
/// the sink exists.
#[derive(Clone)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<(Duration, ScheduledTask)>,
}

impl TokioScheduler {
    /// Create the scheduler and its worker-side receiver.
    pub fn new() -> (Self, TaskReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, TaskReceiver { rx })
    }

    /// Spawn the worker loop that delivers due tasks to `sink`.
    pub fn spawn_worker(
        mut receiver: TaskReceiver,
        sink: std::sync::Arc<dyn TaskSink>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some((delay, task)) = receiver.rx.recv().await {
                let sink = sink.clone();
                tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    sink.run(task).await;
                });
            }
            warn!("scheduler channel closed, worker exiting");
        })
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn run_after(&self, delay: Duration, task: ScheduledTask) -> Result<(), SchedulerError> {
        self.tx
            .send((delay, task))
            .map_err(|_| SchedulerError::Closed)
    }
}

// ============================================================================
// ManualScheduler
// ============================================================================

/// Test scheduler that records enqueued tasks for explicit draining.
#[derive(Default)]
pub struct ManualScheduler {
    queued: Mutex<Vec<(Duration, ScheduledTask)>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued task, in enqueue order, ignoring delays.
    pub fn drain(&self) -> Vec<ScheduledTask> {
        let mut queued = self.queued.lock().expect("scheduler lock poisoned");
        queued.drain(..).map(|(_, task)| task).collect()
    }

    /// Number of tasks currently queued.
    pub fn queued_len(&self) -> usize {
        self.queued.lock().expect("scheduler lock poisoned").len()
    }
}

#[async_trait]
impl Scheduler for ManualScheduler {
    async fn run_after(&self, delay: Duration, task: ScheduledTask) -> Result<(), SchedulerError> {
        self.queued
            .lock()
            .expect("scheduler lock poisoned")
            .push((delay, task));
        Ok(())
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
