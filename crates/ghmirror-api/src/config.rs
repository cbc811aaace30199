//! Service configuration types.
//!
//! The service binary layers defaults, a TOML file, and environment
//! variables into this struct, then calls [`ServiceConfig::validate`] once
//! at startup before anything is marked ready.

use crate::errors::ConfigError;
use ghmirror_core::MirrorConfig;
use serde::{Deserialize, Serialize};

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Webhook intake settings. `secret` is required.
    pub webhook: WebhookConfig,

    /// GitHub access for repo-webhook deployments: one token used for every
    /// mirrored repository. App-mode deployments configure a token backend
    /// instead and leave this unset.
    pub github_token: Option<String>,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Pipeline tunables (retry budgets, bootstrap limits, base URL).
    pub mirror: MirrorConfig,
}

impl ServiceConfig {
    /// Check the configuration for startup-blocking mistakes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first failure found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook.secret.is_empty() {
            return Err(ConfigError::Invalid {
                message: "webhook.secret is required".to_string(),
            });
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".to_string(),
            });
        }
        if self.mirror.raw_event_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "mirror.raw_event_max_attempts must be at least 1".to_string(),
            });
        }
        if self.mirror.raw_event_backoff_base_ms > self.mirror.raw_event_backoff_max_ms {
            return Err(ConfigError::Invalid {
                message: "mirror.raw_event_backoff_base_ms exceeds the configured ceiling"
                    .to_string(),
            });
        }
        if self.mirror.bootstrap_max_per_installation == 0 {
            return Err(ConfigError::Invalid {
                message: "mirror.bootstrap_max_per_installation must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Webhook intake configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WebhookConfig {
    /// HMAC-SHA-256 key for signature verification. Required.
    ///
    /// Serialized as `<REDACTED>` so `/admin/config`-style surfaces cannot
    /// leak it.
    #[serde(serialize_with = "redact_secret")]
    pub secret: String,
}

fn redact_secret<S: serde::Serializer>(_secret: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("<REDACTED>")
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level filter (`error` … `trace`).
    pub level: String,

    /// Emit JSON structured logs instead of the human format.
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
