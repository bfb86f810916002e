//! Cache records and levels.

use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::time::Duration;

/// Which tiers a call's result may occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheLevel {
    /// Never cached; every read reaches the backend.
    None,
    /// Process-local only, cleared when the process ends.
    Memory,
    /// Memory first, then the persistent store.
    MemoryAndStore,
}

impl CacheLevel {
    pub fn uses_memory(&self) -> bool {
        !matches!(self, CacheLevel::None)
    }

    pub fn uses_store(&self) -> bool {
        matches!(self, CacheLevel::MemoryAndStore)
    }
}

/// One cached call result.
///
/// `expires_at == None` marks a memory-only record (TTL zero): it lives
/// until the process ends or it is invalidated, and never reaches the
/// persistent tier.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub fingerprint: Fingerprint,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheRecord {
    /// Build a record whose lifetime is governed by `ttl`.
    ///
    /// TTL zero means memory-only with no expiry; anything longer sets an
    /// absolute expiry instant.
    pub fn new(fingerprint: Fingerprint, payload: Value, ttl: Duration) -> Self {
        let created_at = Utc::now();
        let expires_at = if ttl.is_zero() {
            None
        } else {
            ChronoDuration::from_std(ttl)
                .ok()
                .map(|d| created_at + d)
        };
        Self {
            fingerprint,
            payload,
            created_at,
            expires_at,
        }
    }

    /// True once the record has outlived its TTL.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether this record is eligible for the persistent tier.
    pub fn is_persistable(&self) -> bool {
        self.expires_at.is_some()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fp(tag: &str) -> Fingerprint {
        Fingerprint::from_hex(format!("{:0<64}", tag))
    }

    #[test]
    fn test_level_tier_eligibility() {
        assert!(!CacheLevel::None.uses_memory());
        assert!(!CacheLevel::None.uses_store());
        assert!(CacheLevel::Memory.uses_memory());
        assert!(!CacheLevel::Memory.uses_store());
        assert!(CacheLevel::MemoryAndStore.uses_memory());
        assert!(CacheLevel::MemoryAndStore.uses_store());
    }

    #[test]
    fn test_zero_ttl_is_memory_only() {
        let record = CacheRecord::new(fp("a"), json!(1), Duration::ZERO);
        assert!(record.expires_at.is_none());
        assert!(!record.is_persistable());
        assert!(!record.is_expired());
    }

    #[test]
    fn test_positive_ttl_sets_expiry() {
        let record = CacheRecord::new(fp("b"), json!(1), Duration::from_secs(60));
        assert!(record.is_persistable());
        assert!(!record.is_expired());

        let past_expiry = record.created_at + ChronoDuration::seconds(61);
        assert!(record.is_expired_at(past_expiry));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let record = CacheRecord::new(fp("c"), json!(1), Duration::from_secs(30));
        let exactly = record.expires_at.expect("record should have an expiry");
        // Elapsed time >= TTL triggers a fresh call.
        assert!(record.is_expired_at(exactly));
        assert!(!record.is_expired_at(exactly - ChronoDuration::milliseconds(1)));
    }
}
