//! # gh-mirror workflow engine
//!
//! Durable multi-step orchestration contract. A workflow body runs a
//! sequence of named steps through a [`StepContext`]; each completed step's
//! result is journaled, so a resumed run replays journal hits instead of
//! re-executing the work. Completion is reported through a callback carrying
//! `{workflow_id, kind, error, context}`.
//!
//! The in-memory [`InMemoryWorkflowEngine`] provides the full contract for
//! a single process: per-step retry with exponential backoff, journaled
//! resumption, cancellation, and completion callbacks. A production
//! deployment substitutes an engine whose journal lives in the document
//! store; workflow bodies are written against the contract and do not care.
//!
//! Step results should stay small (ids and counts). A step producing bulk
//! data writes it to the store and journals the key.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod engine;
pub mod step;

pub use engine::{InMemoryWorkflowEngine, WorkflowEngine};
pub use step::{Journal, StepContext, StepError, StepRetryPolicy};

/// Unique identifier for one workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal disposition of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    /// Body returned `Ok`.
    Success,
    /// Engine-internal failure (journal corruption and the like).
    Error,
    /// A step exhausted its retry budget.
    Failed,
    /// Execution was canceled before completing.
    Canceled,
}

/// Payload delivered to the completion callback.
#[derive(Debug, Clone)]
pub struct Completion {
    pub workflow_id: WorkflowId,
    pub kind: CompletionKind,
    pub error: Option<String>,
    /// Caller-supplied context echoed back verbatim (ids, not payloads).
    pub context: serde_json::Value,
}

/// Callback invoked exactly once when a workflow reaches a terminal state.
#[async_trait::async_trait]
pub trait CompletionHandler: Send + Sync {
    async fn on_complete(&self, completion: Completion);
}

/// A workflow definition: the step sequence executed through `steps`.
#[async_trait::async_trait]
pub trait WorkflowBody: Send + Sync + 'static {
    async fn run(&self, steps: StepContext) -> Result<(), WorkflowError>;
}

/// Errors surfaced from workflow execution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    /// A step failed permanently (non-retryable error, or retries exhausted).
    #[error("workflow step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    /// The engine canceled the execution.
    #[error("workflow canceled")]
    Canceled,

    /// Journal serialization failure — an engine bug or a step result that
    /// does not round-trip.
    #[error("workflow journal error: {message}")]
    Journal { message: String },
}

impl WorkflowError {
    /// Map to the completion kind reported to the callback.
    pub fn completion_kind(&self) -> CompletionKind {
        match self {
            Self::StepFailed { .. } => CompletionKind::Failed,
            Self::Canceled => CompletionKind::Canceled,
            Self::Journal { .. } => CompletionKind::Error,
        }
    }
}
