//! Error types for Strata operations

use crate::{EntityKind, Operation};
use thiserror::Error;

/// Declarative configuration errors.
///
/// These are always fatal: a missing endpoint or an unresolvable template
/// token is a wiring mistake, never something to degrade around.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No descriptor registered for {kind} property '{property}'")]
    DescriptorNotFound { kind: EntityKind, property: String },

    #[error("Operation '{operation}' has no endpoint configured for {kind}")]
    MissingEndpoint { kind: EntityKind, operation: Operation },

    #[error("Operation '{operation}' is not supported by the {backend} backend")]
    UnsupportedOperation { backend: String, operation: Operation },

    #[error("Endpoint template '{template}' is malformed: {reason}")]
    MalformedTemplate { template: String, reason: String },

    #[error("Unresolved token '{token}' in endpoint template '{template}'")]
    UnresolvedToken { token: String, template: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Token acquisition errors. Fatal and surfaced immediately.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Failed to acquire access token for scope '{scope}': {reason}")]
    TokenAcquisition { scope: String, reason: String },
}

/// Errors from calls to the remote partner service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Network-level failure. Transient; callers may retry, this layer
    /// never does.
    #[error("Transport failure calling {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The call exceeded its configured timeout. Also transient.
    #[error("Call to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// The service answered with status >= 400 and a parsed message.
    #[error("Remote service rejected the call with status {status}: {message}")]
    ServerRejected { status: u16, message: String },

    /// The body could not be decoded as its declared content type.
    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// A success response carried a content type this layer cannot parse.
    #[error("Unsupported content type '{content_type}' from {url}")]
    UnsupportedContentType { url: String, content_type: String },
}

impl RemoteError {
    /// True for failures a caller could meaningfully retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transport { .. } | RemoteError::Timeout { .. })
    }
}

/// Cache tier errors.
///
/// The persistent tier is strictly best-effort: these never prevent a
/// resolution from falling through to the backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Persistent cache store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("Cache payload serialization failed: {reason}")]
    Serialization { reason: String },
}

/// Master error type for all Strata errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StrataError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StrataError {
    /// Errors that must surface immediately regardless of failure mode.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StrataError::Config(_) | StrataError::Auth(_))
    }

    /// Errors eligible for the soft-fail path (logged, degraded value).
    ///
    /// Transport failures and server rejections degrade to `None` under
    /// the default soft failure mode; everything else propagates.
    pub fn is_suppressible(&self) -> bool {
        match self {
            StrataError::Remote(e) => matches!(
                e,
                RemoteError::Transport { .. }
                    | RemoteError::Timeout { .. }
                    | RemoteError::ServerRejected { .. }
            ),
            StrataError::Backend(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for Strata operations.
pub type StrataResult<T> = Result<T, StrataError>;

// =============================================================================
// TESTS
// =============================================================================
