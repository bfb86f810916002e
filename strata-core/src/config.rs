//! Resolution configuration
//!
//! All runtime toggles live on one explicit value that is passed through
//! call chains. Nothing here is a process-wide static, so tests can run
//! divergent configurations side by side.

use crate::error::{ConfigError, StrataResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens when a resolution fails and no usable cached value exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureMode {
    /// Log the classified error and yield `None`.
    Soft,
    /// Raise the classified error to the caller.
    Strict,
}

/// What happens when the remote service answers with status >= 400.
///
/// The legacy behavior of logging and continuing turned out to hide
/// partner outages, so the default here is to fail closed; fail-open is
/// an explicit opt-in for surfaces that prefer degraded output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionPolicy {
    /// Raise `RemoteError::ServerRejected`.
    FailClosed,
    /// Log the rejection and return a degraded (absent) body.
    FailOpen,
}

/// Toggles for the optional call ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerOptions {
    /// Master switch; when false nothing is recorded.
    pub enabled: bool,
    /// Record calls that were answered from cache.
    pub log_cache_hits: bool,
    /// Truncate recorded request bodies to this many bytes.
    pub max_request_len: Option<usize>,
    /// Record response bodies alongside requests.
    pub include_response: bool,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            log_cache_hits: false,
            max_request_len: Some(4096),
            include_response: true,
        }
    }
}

/// Master configuration for the resolution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Global cache kill-switch. When false every cache-eligible
    /// operation goes straight to its backend, regardless of descriptor
    /// cache levels.
    pub cache_enabled: bool,
    /// TTL applied when a descriptor does not override it.
    pub default_ttl: Duration,
    /// Soft-fail vs strict resolution failures.
    pub failure_mode: FailureMode,
    /// Fail-open vs fail-closed handling of >= 400 responses.
    pub rejection_policy: RejectionPolicy,
    /// Call ledger toggles.
    pub ledger: LedgerOptions,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            default_ttl: Duration::from_secs(300),
            failure_mode: FailureMode::Soft,
            rejection_policy: RejectionPolicy::FailClosed,
            ledger: LedgerOptions::default(),
        }
    }
}

impl ResolutionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable caching globally (the operational escape hatch).
    pub fn with_cache_disabled(mut self) -> Self {
        self.cache_enabled = false;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    pub fn with_rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.rejection_policy = policy;
        self
    }

    pub fn with_ledger(mut self, ledger: LedgerOptions) -> Self {
        self.ledger = ledger;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> StrataResult<()> {
        if let Some(max) = self.ledger.max_request_len {
            if max == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "ledger.max_request_len".to_string(),
                    value: "0".to_string(),
                    reason: "use None to disable truncation, a zero limit records nothing"
                        .to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
