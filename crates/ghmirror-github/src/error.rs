//! GitHub API error classification.

use std::time::Duration;

/// Errors from GitHub REST calls, classified for the retry policy.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 403/429 with rate-limit semantics. `retry_after` carries the server
    /// hint when one was sent.
    #[error("rate limited by GitHub{}", retry_after.map(|d| format!(" (retry after {}s)", d.as_secs())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// 5xx from GitHub.
    #[error("GitHub upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Connection-level failure before a status was received.
    #[error("network error talking to GitHub: {message}")]
    Network { message: String },

    /// 401, or 403 without rate-limit markers.
    #[error("GitHub rejected credentials: {message}")]
    Auth { message: String },

    /// 404.
    #[error("GitHub resource not found: {resource}")]
    NotFound { resource: String },

    /// 4xx validation failure (422 and friends) — the request is wrong, not
    /// the moment.
    #[error("GitHub rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Body did not match the expected shape.
    #[error("failed to decode GitHub response: {message}")]
    Decode { message: String },
}

impl ApiError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Upstream { .. } => true,
            Self::Network { .. } => true,
            Self::Auth { .. } => false,
            Self::NotFound { .. } => false,
            Self::Rejected { .. } => false,
            Self::Decode { .. } => false,
        }
    }

    /// HTTP status carried by the failure, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Upstream { status, .. } => Some(*status),
            Self::Rejected { status, .. } => Some(*status),
            Self::Auth { .. } => Some(401),
            Self::NotFound { .. } => Some(404),
            Self::Network { .. } | Self::Decode { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
