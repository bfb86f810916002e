//! Tenant context
//!
//! Multiple tenants share one set of connections; what separates them is
//! an addressing prefix applied at the moment storage metadata is used.
//! The generation counter lets downstream resolvers detect a tenant
//! switch between two calls in the same process.

use serde::{Deserialize, Serialize};

/// The active tenant's addressing state.
///
/// Created fresh per request. Must never be pooled or carried into
/// another request that shares the same connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    prefix: String,
    generation: u64,
}

impl TenantContext {
    /// Start a context for the given addressing prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            generation: 0,
        }
    }

    /// The active addressing prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Monotonic counter bumped on every switch.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Switch to a different tenant within the same process.
    ///
    /// Bumps the generation even if the prefix is unchanged, so resolvers
    /// re-derive addressing rather than trusting anything cached.
    pub fn switch_to(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
        self.generation += 1;
    }

    /// Apply the prefix to a base storage name.
    pub fn address(&self, base: &str) -> String {
        format!("{}{}", self.prefix, base)
    }
}

// =============================================================================
// TESTS
// =============================================================================
