//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ghmirror_core::MirrorError;
use serde::Serialize;

/// Configuration errors surfaced at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    #[error("failed to load configuration: {message}")]
    Load { message: String },
}

/// JSON error envelope returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// Wrapper turning pipeline errors into HTTP responses.
#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl HttpError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: "bad_request",
                message: message.into(),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                error: "not_found",
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ErrorBody {
                error: "unauthorized",
                message: message.into(),
            },
        }
    }
}

impl From<MirrorError> for HttpError {
    fn from(err: MirrorError) -> Self {
        let (status, tag) = match &err {
            MirrorError::SignatureInvalid { .. } => (StatusCode::UNAUTHORIZED, "unauthorized"),
            MirrorError::MalformedPayload { .. } | MirrorError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            MirrorError::DuplicateOperation { .. } => (StatusCode::CONFLICT, "duplicate_operation"),
            MirrorError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            MirrorError::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            MirrorError::UpstreamRateLimited { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "rate_limited")
            }
            MirrorError::UpstreamUnavailable { .. } => (StatusCode::BAD_GATEWAY, "upstream"),
            MirrorError::UpstreamRejected { .. } => (StatusCode::BAD_GATEWAY, "upstream_rejected"),
            MirrorError::UnknownEvent { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "unknown_event"),
            MirrorError::WorkflowStepFailed { .. } | MirrorError::BootstrapItemFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
            MirrorError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store"),
        };
        Self {
            status,
            body: ErrorBody {
                error: tag,
                message: err.to_string(),
            },
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
