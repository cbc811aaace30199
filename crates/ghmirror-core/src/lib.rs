//! # gh-mirror core
//!
//! The ingestion and projection pipeline that turns GitHub into a
//! low-latency local read model:
//!
//! - signature-verified webhook intake into an idempotent raw-event log
//!   with retry and dead-lettering ([`ingest`]);
//! - decoding and routing of events into normalized domain upserts with
//!   out-of-order protection ([`dispatch`]);
//! - a durable, chunked bootstrap backfill per repository with
//!   per-installation concurrency gating ([`bootstrap`]);
//! - optimistic client writes reconciled by webhooks ([`optimistic`]);
//! - derived overview/activity projections and cursor-paginated reads
//!   ([`projection`]).
//!
//! External collaborators — the document store, the GitHub REST API, the
//! workflow engine, and the scheduler — are reached only through traits, so
//! every piece of the pipeline runs unchanged against test doubles.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub mod bootstrap;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod ingest;
pub mod model;
pub mod optimistic;
pub mod projection;
pub mod services;
pub mod store;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::MirrorConfig;
pub use error::{ErrorCategory, MirrorError};
pub use services::{Clock, ManualClock, Services, SystemClock};

/// Standard result type for mirror operations.
pub type MirrorResult<T> = Result<T, MirrorError>;

// ============================================================================
// Identifier Types
// ============================================================================

/// GitHub's numeric repository id; the mirror's primary repository key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepositoryId(u64);

impl RepositoryId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RepositoryId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.parse::<u64>().map_err(|_| ParseError::InvalidFormat {
            expected: "positive integer".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self::new(id))
    }
}

/// GitHub's numeric user id. Logins are captured for display, but every
/// foreign key is this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(u64);

impl UserId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// GitHub App installation id, treated as an opaque grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstallationId(u64);

impl InstallationId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// GitHub-assigned unique id per webhook delivery; the dedup key for intake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(String);

impl DeliveryId {
    /// Accepts any non-empty delivery id. GitHub sends UUIDs, but bootstrap
    /// dead letters reuse this keyspace with `bootstrap-…` ids.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "delivery_id".to_string(),
            });
        }
        if value.len() > 256 {
            return Err(ValidationError::TooLong {
                field: "delivery_id".to_string(),
                max_length: 256,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeliveryId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Identifier of one sync job (bootstrap, reconcile, or replay).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(uuid::Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = uuid::Uuid::parse_str(s).map_err(|_| ParseError::InvalidFormat {
            expected: "UUID".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(id))
    }
}

/// Client-chosen string linking an optimistic write to its confirming
/// webhook. Unique across time per caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "correlation_id".to_string(),
            });
        }
        if value.len() > 128 {
            return Err(ValidationError::TooLong {
                field: "correlation_id".to_string(),
                max_length: 128,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Timestamps
// ============================================================================

/// Epoch-millisecond timestamp; the single time representation in stored
/// state. RFC3339 strings from GitHub are converted at the decode boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Current wall-clock time. Production code reaches this through
    /// [`Clock`] so tests can pin time.
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Parse an RFC3339 string (the GitHub wire format).
    pub fn from_rfc3339(s: &str) -> Result<Self, ParseError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|_| ParseError::InvalidFormat {
            expected: "RFC3339 datetime".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(dt.with_timezone(&Utc).timestamp_millis()))
    }

    /// Render as RFC3339 for API responses and logs.
    pub fn to_rfc3339(&self) -> String {
        match Utc.timestamp_millis_opt(self.0) {
            chrono::LocalResult::Single(dt) => dt.to_rfc3339(),
            _ => format!("invalid({})", self.0),
        }
    }

    pub fn saturating_add(&self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_millis() as i64))
    }

    pub fn saturating_sub(&self, duration: Duration) -> Self {
        Self(self.0.saturating_sub(duration.as_millis() as i64))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

// ============================================================================
// Validation / parse errors
// ============================================================================

/// Error type for input validation failures.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },
}

/// Error type for string parsing failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
