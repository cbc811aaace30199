//! Bootstrap backfill: durable per-repository hydration from the REST API.
//!
//! A newly connected (or auto-discovered) repository gets a [`SyncJob`]
//! whose work runs as a workflow: branches, then pull requests and issues
//! in durable chunks, commits, check runs for the open PRs' head SHAs,
//! workflow runs and jobs, and finally queued file-diff syncs. The
//! [`gate::BootstrapGate`] enforces the per-installation concurrency cap
//! and drains pending jobs as running ones finish.

use crate::model::SyncJob;

pub mod connect;
pub mod convert;
pub mod gate;
pub mod pr_sync;
pub mod workflow;

pub use connect::{ConnectOutcome, ConnectService};
pub use gate::{BootstrapGate, StartOutcome};
pub use pr_sync::sync_pull_request_details;
pub use workflow::BootstrapWorkflow;

/// Context journaled with each workflow so the completion callback can find
/// its job without re-reading engine state.
pub(crate) fn workflow_context(job: &SyncJob) -> serde_json::Value {
    serde_json::json!({
        "job_id": job.job_id.to_string(),
        "installation_id": job.installation_id.map(|i| i.as_u64()),
    })
}
