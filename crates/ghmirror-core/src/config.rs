//! Pipeline configuration.
//!
//! The enumerated options of the system's configuration surface, with the
//! documented defaults. The service binary layers file and environment
//! sources on top via the `config` crate; core code only sees this struct.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for intake, retry, bootstrap, and dead-lettering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// REST base URL for GitHub.
    pub github_api_base_url: String,

    /// Publicly reachable webhook callback URL registered on connect.
    pub webhook_callback_url: String,

    /// Concurrency cap: running sync jobs per installation.
    pub bootstrap_max_per_installation: u32,

    /// Raw-event attempts before `failed`.
    pub raw_event_max_attempts: u32,

    /// Initial raw-event retry backoff in milliseconds.
    pub raw_event_backoff_base_ms: u64,

    /// Backoff ceiling in milliseconds.
    pub raw_event_backoff_max_ms: u64,

    /// Age after which `failed` events graduate to the dead-letter table.
    pub dead_letter_age_ms: u64,

    /// Commits fetched from the default branch during bootstrap.
    pub bootstrap_commit_limit: u32,

    /// REST pages fetched per durable PR/issue chunk step.
    pub bootstrap_chunk_pages: u32,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            github_api_base_url: "https://api.github.com".to_string(),
            webhook_callback_url: "http://localhost:8080/api/github/webhook".to_string(),
            bootstrap_max_per_installation: 25,
            raw_event_max_attempts: 5,
            raw_event_backoff_base_ms: 60_000,
            raw_event_backoff_max_ms: 1_800_000,
            dead_letter_age_ms: 86_400_000,
            bootstrap_commit_limit: 100,
            bootstrap_chunk_pages: 10,
        }
    }
}

impl MirrorConfig {
    pub fn raw_event_backoff_base(&self) -> Duration {
        Duration::from_millis(self.raw_event_backoff_base_ms)
    }

    pub fn raw_event_backoff_max(&self) -> Duration {
        Duration::from_millis(self.raw_event_backoff_max_ms)
    }

    pub fn dead_letter_age(&self) -> Duration {
        Duration::from_millis(self.dead_letter_age_ms)
    }
}
