//! Per-call token resolution.
//!
//! The bootstrap workflow resolves a token for every GitHub action it runs:
//! the OAuth token of the user who connected the repository when one is on
//! file, otherwise an installation token. Resolution happens outside the
//! workflow journal so credentials are never persisted with step results.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use zeroize::Zeroizing;

/// A bearer token for the GitHub API.
///
/// The inner value is zeroized on drop and excluded from `Debug` output.
#[derive(Clone)]
pub struct AccessToken(Zeroizing<String>);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    /// Read the raw token for an outgoing request header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AccessToken").field(&"<REDACTED>").finish()
    }
}

/// Identity context a token is resolved for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenScope {
    /// Installation the repository belongs to.
    pub installation_id: Option<u64>,

    /// User who connected the repository, when known.
    pub connected_by_user_id: Option<u64>,
}

/// Failure to produce a token for a scope.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    /// Neither a user token nor an installation token is on file.
    #[error("no token source for scope (installation={installation_id:?}, user={user_id:?})")]
    NoTokenSource {
        installation_id: Option<u64>,
        user_id: Option<u64>,
    },

    #[error("token backend unavailable: {message}")]
    Unavailable { message: String },
}

/// Resolve an [`AccessToken`] for a scope.
#[async_trait]
pub trait TokenResolver: Send + Sync {
    async fn resolve(&self, scope: &TokenScope) -> Result<AccessToken, TokenError>;
}

// ============================================================================
// StaticTokenResolver
// ============================================================================

/// Resolver backed by a single configured token.
///
/// Suits repo-webhook deployments where one PAT covers every mirrored
/// repository. Multi-tenant deployments register per-user and
/// per-installation tokens via [`InMemoryTokenResolver`] or a vault-backed
/// implementation.
pub struct StaticTokenResolver {
    token: AccessToken,
}

impl StaticTokenResolver {
    pub fn new(token: AccessToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenResolver for StaticTokenResolver {
    async fn resolve(&self, _scope: &TokenScope) -> Result<AccessToken, TokenError> {
        Ok(self.token.clone())
    }
}

// ============================================================================
// InMemoryTokenResolver
// ============================================================================

/// Resolver over in-process token tables: user OAuth tokens first, then
/// installation tokens.
#[derive(Default)]
pub struct InMemoryTokenResolver {
    user_tokens: RwLock<HashMap<u64, AccessToken>>,
    installation_tokens: RwLock<HashMap<u64, AccessToken>>,
}

impl InMemoryTokenResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_user_token(&self, user_id: u64, token: AccessToken) {
        self.user_tokens
            .write()
            .expect("token lock poisoned")
            .insert(user_id, token);
    }

    pub fn put_installation_token(&self, installation_id: u64, token: AccessToken) {
        self.installation_tokens
            .write()
            .expect("token lock poisoned")
            .insert(installation_id, token);
    }
}

#[async_trait]
impl TokenResolver for InMemoryTokenResolver {
    async fn resolve(&self, scope: &TokenScope) -> Result<AccessToken, TokenError> {
        if let Some(user_id) = scope.connected_by_user_id {
            if let Some(token) = self
                .user_tokens
                .read()
                .expect("token lock poisoned")
                .get(&user_id)
            {
                return Ok(token.clone());
            }
        }
        if let Some(installation_id) = scope.installation_id {
            if let Some(token) = self
                .installation_tokens
                .read()
                .expect("token lock poisoned")
                .get(&installation_id)
            {
                return Ok(token.clone());
            }
        }
        Err(TokenError::NoTokenSource {
            installation_id: scope.installation_id,
            user_id: scope.connected_by_user_id,
        })
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
