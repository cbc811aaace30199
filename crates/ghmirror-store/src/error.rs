//! Error surface for document-store operations.

/// Errors returned by store operations.
///
/// The store is a collaborator behind a trait; callers use
/// [`StoreError::is_transient`] to decide between retry and surfacing the
/// failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    #[error("conditional update rejected: {message}")]
    Conflict { message: String },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("serialization failed: {message}")]
    Serialization { message: String },
}

impl StoreError {
    /// Whether a retry of the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Conflict { .. } => false,
            Self::NotFound { .. } => false,
            Self::Serialization { .. } => false,
        }
    }

    /// Shorthand for a [`StoreError::NotFound`] with a displayable key.
    pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Shorthand for a [`StoreError::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
