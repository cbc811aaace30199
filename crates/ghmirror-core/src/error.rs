//! Error taxonomy for the ingestion and projection pipeline.
//!
//! One tagged sum type; every variant carries its own payload and maps to a
//! disposition: retried, recovered locally, surfaced to the caller, or
//! dead-lettered. Propagation is by value through `Result` — nothing in the
//! pipeline panics on bad input.

use crate::{CorrelationId, ValidationError};
use ghmirror_github::ApiError;
use ghmirror_store::StoreError;
use std::time::Duration;

/// High-level categorization for retry and alerting decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Temporary failures that should be retried.
    Transient,
    /// Permanent failures that won't succeed on retry.
    Permanent,
    /// Security-related failures requiring immediate attention.
    Security,
    /// Configuration errors preventing startup.
    Configuration,
}

/// Top-level error for mirror operations.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// HMAC signature did not match; an audit row was written.
    #[error("webhook signature invalid for delivery {delivery_id}")]
    SignatureInvalid { delivery_id: String },

    /// JSON parse or schema decode failure — deterministic, never retried.
    #[error("malformed payload: {message}")]
    MalformedPayload { message: String },

    /// Event/action combination the dispatcher does not route.
    #[error("unhandled event {event_name}{}", action.as_deref().map(|a| format!("/{}", a)).unwrap_or_default())]
    UnknownEvent {
        event_name: String,
        action: Option<String>,
    },

    /// GitHub 5xx or connection failure.
    #[error("GitHub unavailable: {message}")]
    UpstreamUnavailable {
        status: Option<u16>,
        message: String,
    },

    /// GitHub 403/429; retried honoring the hint.
    #[error("GitHub rate limited")]
    UpstreamRateLimited { retry_after: Option<Duration> },

    /// GitHub rejected a write (validation, auth); surfaced to the caller.
    #[error("GitHub rejected request: {message}")]
    UpstreamRejected {
        status: Option<u16>,
        message: String,
    },

    /// Out-of-order update skipped by the timestamp guard. Recovered
    /// locally — the raw event still counts as processed.
    #[error("stale update skipped for {entity} {key}")]
    Conflict { entity: &'static str, key: String },

    /// Reused correlation id on an optimistic write.
    #[error("duplicate operation for correlation {correlation_id}")]
    DuplicateOperation { correlation_id: CorrelationId },

    /// A workflow step exhausted its retry budget.
    #[error("workflow step '{step}' failed: {message}")]
    WorkflowStepFailed { step: String, message: String },

    /// One bootstrap chunk could not be written; dead-lettered, workflow
    /// proceeds.
    #[error("bootstrap item failed ({kind}): {detail}")]
    BootstrapItemFailed { kind: String, detail: String },

    /// The referenced entity does not exist in the mirror.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl MirrorError {
    /// Whether the raw-event retry controller should schedule another
    /// attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::UpstreamUnavailable { .. } => true,
            Self::UpstreamRateLimited { .. } => true,
            Self::Store(store) => store.is_transient(),
            Self::SignatureInvalid { .. } => false,
            Self::MalformedPayload { .. } => false,
            Self::UnknownEvent { .. } => false,
            Self::UpstreamRejected { .. } => false,
            Self::Conflict { .. } => false,
            Self::DuplicateOperation { .. } => false,
            Self::WorkflowStepFailed { .. } => false,
            Self::BootstrapItemFailed { .. } => false,
            Self::NotFound { .. } => false,
            Self::Validation(_) => false,
        }
    }

    /// Category for monitoring and alerting.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SignatureInvalid { .. } => ErrorCategory::Security,
            Self::UpstreamUnavailable { .. } | Self::UpstreamRateLimited { .. } => {
                ErrorCategory::Transient
            }
            Self::Store(store) if store.is_transient() => ErrorCategory::Transient,
            _ => ErrorCategory::Permanent,
        }
    }

    /// `Retry-After` hint when the upstream sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::UpstreamRateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<ApiError> for MirrorError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::RateLimited { retry_after } => Self::UpstreamRateLimited { retry_after },
            ApiError::Upstream { status, message } => Self::UpstreamUnavailable {
                status: Some(status),
                message,
            },
            ApiError::Network { message } => Self::UpstreamUnavailable {
                status: None,
                message,
            },
            ApiError::Auth { message } => Self::UpstreamRejected {
                status: Some(401),
                message,
            },
            ApiError::NotFound { resource } => Self::UpstreamRejected {
                status: Some(404),
                message: format!("not found: {}", resource),
            },
            ApiError::Rejected { status, message } => Self::UpstreamRejected {
                status: Some(status),
                message,
            },
            ApiError::Decode { message } => Self::MalformedPayload { message },
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
