//! Persistent cache tier trait.
//!
//! Implementations are shared across processes and strictly best-effort:
//! the manager treats any error here as a miss and falls through to the
//! backend.

use crate::fingerprint::Fingerprint;
use crate::record::CacheRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use strata_core::CacheError;

/// Persistent cache store, keyed by fingerprint.
///
/// Records are immutable once written until they expire; overwrites are
/// last-write-wins per fingerprint, so implementations need no cross-key
/// locking.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a record, expired or not. Expiry is the caller's concern so
    /// that an expired record can be deleted in the same pass.
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheRecord>, CacheError>;

    /// Write or overwrite a record.
    async fn put(&self, record: &CacheRecord) -> Result<(), CacheError>;

    /// Remove a record. Removing an absent record is not an error.
    async fn delete(&self, fingerprint: &Fingerprint) -> Result<(), CacheError>;

    /// Drop every record expired as of `now`. Returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheError>;
}

/// Map-backed store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, CacheRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheRecord>, CacheError> {
        let records = self.records.read().map_err(|_| CacheError::StoreUnavailable {
            reason: "store lock poisoned".to_string(),
        })?;
        Ok(records.get(fingerprint.as_str()).cloned())
    }

    async fn put(&self, record: &CacheRecord) -> Result<(), CacheError> {
        let mut records = self.records.write().map_err(|_| CacheError::StoreUnavailable {
            reason: "store lock poisoned".to_string(),
        })?;
        records.insert(record.fingerprint.as_str().to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, fingerprint: &Fingerprint) -> Result<(), CacheError> {
        let mut records = self.records.write().map_err(|_| CacheError::StoreUnavailable {
            reason: "store lock poisoned".to_string(),
        })?;
        records.remove(fingerprint.as_str());
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheError> {
        let mut records = self.records.write().map_err(|_| CacheError::StoreUnavailable {
            reason: "store lock poisoned".to_string(),
        })?;
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        Ok((before - records.len()) as u64)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn fp(tag: &str) -> Fingerprint {
        Fingerprint::from_hex(format!("{:0<64}", tag))
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = InMemoryStore::new();
        let record = CacheRecord::new(fp("a"), json!({"v": 1}), Duration::from_secs(60));

        store.put(&record).await.expect("put should succeed");
        let got = store.get(&fp("a")).await.expect("get should succeed");
        assert_eq!(got, Some(record));

        store.delete(&fp("a")).await.expect("delete should succeed");
        assert_eq!(store.get(&fp("a")).await.expect("get should succeed"), None);
    }

    #[tokio::test]
    async fn test_delete_absent_is_ok() {
        let store = InMemoryStore::new();
        assert!(store.delete(&fp("missing")).await.is_ok());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = InMemoryStore::new();

        let live = CacheRecord::new(fp("live"), json!(1), Duration::from_secs(600));
        let mut dead = CacheRecord::new(fp("dead"), json!(2), Duration::from_secs(600));
        dead.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));

        store.put(&live).await.expect("put should succeed");
        store.put(&dead).await.expect("put should succeed");

        let purged = store.purge_expired(Utc::now()).await.expect("purge should succeed");
        assert_eq!(purged, 1);
        assert!(store.get(&fp("live")).await.expect("get should succeed").is_some());
        assert!(store.get(&fp("dead")).await.expect("get should succeed").is_none());
    }
}
