//! Access-token collaborator.
//!
//! Token acquisition is owned by an external collaborator; this layer
//! only defines the contract. Scopes are entity-kind names, so the
//! collaborator can hand out differently-privileged tokens per kind.

use async_trait::async_trait;
use strata_core::error::AuthError;

/// Supplier of bearer tokens, scoped by entity kind.
///
/// Implementations must be thread-safe (Send + Sync). Failures are
/// fatal to the call: there is no degraded path for auth.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Obtain a bearer token for the given scope.
    async fn access_token(&self, scope: &str) -> Result<String, AuthError>;
}

/// Fixed-token provider for tests and single-credential deployments.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self, _scope: &str) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
