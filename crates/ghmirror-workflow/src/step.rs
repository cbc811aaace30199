//! Journaled step execution.

use crate::WorkflowError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Error returned by a step body.
///
/// Step bodies translate their domain errors into this shape; `retryable`
/// drives the engine's backoff loop.
#[derive(Debug, Clone)]
pub struct StepError {
    pub message: String,
    pub retryable: bool,
}

impl StepError {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }
}

/// Per-step retry policy: exponential backoff, no jitter (the engine is the
/// only caller racing against itself).
#[derive(Debug, Clone)]
pub struct StepRetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for StepRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl StepRetryPolicy {
    /// Delay before retry `attempt` (1-based): `min(base * 2^(attempt-1), max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }

    /// Immediate-retry policy for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

/// Journal of completed step results for one workflow execution.
///
/// Keys are step names; step names must be unique within a workflow (chunked
/// steps embed their chunk index in the name).
#[derive(Default)]
pub struct Journal {
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, step: &str) -> Option<serde_json::Value> {
        self.entries
            .lock()
            .expect("journal lock poisoned")
            .get(step)
            .cloned()
    }

    pub fn record(&self, step: &str, value: serde_json::Value) {
        self.entries
            .lock()
            .expect("journal lock poisoned")
            .insert(step.to_string(), value);
    }

    /// Names of completed steps, for progress reporting.
    pub fn completed_steps(&self) -> Vec<String> {
        self.entries
            .lock()
            .expect("journal lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

/// Handle a workflow body uses to run its steps.
#[derive(Clone)]
pub struct StepContext {
    journal: std::sync::Arc<Journal>,
    retry: StepRetryPolicy,
}

impl StepContext {
    pub fn new(journal: std::sync::Arc<Journal>, retry: StepRetryPolicy) -> Self {
        Self { journal, retry }
    }

    /// Execute `action` as the durable step `name`.
    ///
    /// On a journal hit the recorded result is returned without running the
    /// action. Otherwise the action runs under the retry policy; a
    /// successful result is journaled before being returned.
    pub async fn run_step<T, F, Fut>(&self, name: &str, action: F) -> Result<T, WorkflowError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, StepError>> + Send,
    {
        if let Some(recorded) = self.journal.lookup(name) {
            debug!(step = %name, "journal hit, skipping execution");
            return serde_json::from_value(recorded).map_err(|e| WorkflowError::Journal {
                message: format!("step '{}' result does not round-trip: {}", name, e),
            });
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match action().await {
                Ok(result) => {
                    let value =
                        serde_json::to_value(&result).map_err(|e| WorkflowError::Journal {
                            message: format!("step '{}' result not serializable: {}", name, e),
                        })?;
                    self.journal.record(name, value);
                    return Ok(result);
                }
                Err(err) if err.retryable && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        step = %name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err.message,
                        "step failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => {
                    return Err(WorkflowError::StepFailed {
                        step: name.to_string(),
                        message: err.message,
                    });
                }
            }
        }
    }

    /// Names of steps already journaled for this execution.
    pub fn completed_steps(&self) -> Vec<String> {
        self.journal.completed_steps()
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
