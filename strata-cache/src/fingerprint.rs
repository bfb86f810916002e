//! Call fingerprints.
//!
//! A fingerprint deterministically identifies a cacheable call: same
//! entity kind, operation, and parameters always hash to the same value,
//! regardless of the order parameters were assembled in.

use serde_json::Value;
use std::fmt;
use strata_core::{sha256_hex, EntityKind, Operation};

/// Deterministic identity of a cacheable call.
///
/// Hex-encoded SHA-256, so fingerprints are safe to use directly as
/// persistent store keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of (kind, operation, params).
    ///
    /// Parameters are normalized through canonical JSON: object keys are
    /// emitted in sorted order (the serde_json default map is ordered),
    /// so two parameter maps with the same contents hash identically.
    pub fn compute(kind: EntityKind, operation: Operation, params: &Value) -> Self {
        let canonical = serde_json::to_string(params).unwrap_or_default();
        let input = format!("{}\n{}\n{}", kind.name(), operation.as_str(), canonical);
        Self(sha256_hex(input.as_bytes()))
    }

    /// Wrap a precomputed fingerprint (e.g. read back from the store).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// TESTS
// =============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        /// Same inputs always produce the same fingerprint.
        #[test]
        fn prop_fingerprint_deterministic(
            key in "[a-z]{1,16}",
            value in any::<i64>(),
        ) {
            let params = json!({ key.clone(): value });
            let a = Fingerprint::compute(EntityKind::new("domain"), Operation::Load, &params);
            let b = Fingerprint::compute(EntityKind::new("domain"), Operation::Load, &params);
            prop_assert_eq!(a, b);
        }

        /// Different parameter values produce different fingerprints.
        #[test]
        fn prop_fingerprint_separates_params(a in any::<i64>(), b in any::<i64>()) {
            prop_assume!(a != b);
            let fp_a = Fingerprint::compute(EntityKind::new("domain"), Operation::Load, &json!({"v": a}));
            let fp_b = Fingerprint::compute(EntityKind::new("domain"), Operation::Load, &json!({"v": b}));
            prop_assert_ne!(fp_a, fp_b);
        }
    }
}
