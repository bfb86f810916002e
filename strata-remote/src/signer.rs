//! Request signing.
//!
//! Outbound payloads carry an opaque, timestamp-bound signature so the
//! partner service can reject replays. The digest covers the shared
//! secret, the issue timestamp, and the canonical JSON of the payload.

use serde_json::{Map, Value};
use strata_core::sha256_hex;

/// Field name the signature is written under.
pub const SIGNATURE_FIELD: &str = "signature";
/// Field name the signing timestamp is written under.
pub const SIGNED_AT_FIELD: &str = "signed_at";

/// Signs outbound payloads with a shared secret.
#[derive(Clone)]
pub struct RequestSigner {
    secret: String,
}

impl RequestSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Compute the signature for a payload at a given timestamp.
    ///
    /// The payload is canonicalized through serde_json (sorted object
    /// keys), so field insertion order cannot change the digest.
    pub fn signature(&self, payload: &Map<String, Value>, issued_at: i64) -> String {
        let canonical = serde_json::to_string(payload).unwrap_or_default();
        sha256_hex(format!("{}\n{}\n{}", self.secret, issued_at, canonical).as_bytes())
    }

    /// Sign `payload` in place, adding the signature and timestamp fields.
    ///
    /// The signature covers the payload as it stands before the two
    /// fields are added.
    pub fn apply(&self, payload: &mut Map<String, Value>) {
        let issued_at = chrono::Utc::now().timestamp();
        self.apply_at(payload, issued_at);
    }

    /// Like [`apply`](Self::apply) with an explicit timestamp.
    pub fn apply_at(&self, payload: &mut Map<String, Value>, issued_at: i64) {
        let signature = self.signature(payload, issued_at);
        payload.insert(SIGNED_AT_FIELD.to_string(), Value::from(issued_at));
        payload.insert(SIGNATURE_FIELD.to_string(), Value::from(signature));
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
