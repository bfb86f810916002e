//! In-process cache tier.
//!
//! A plain map behind an `RwLock`. Entries are pruned lazily: an expired
//! record is dropped on the read that discovers it.

use crate::fingerprint::Fingerprint;
use crate::record::CacheRecord;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

/// Process-local cache tier, cleared when the process ends.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: RwLock<HashMap<String, CacheRecord>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch an unexpired record, dropping it lazily if its TTL passed.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CacheRecord> {
        let now = Utc::now();
        {
            let entries = self.entries.read().ok()?;
            match entries.get(fingerprint.as_str()) {
                Some(record) if !record.is_expired_at(now) => return Some(record.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: upgrade to a write lock and evict.
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(fingerprint.as_str());
        }
        None
    }

    /// Insert or overwrite. Last write wins per fingerprint.
    pub fn put(&self, record: CacheRecord) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(record.fingerprint.as_str().to_string(), record);
        }
    }

    pub fn remove(&self, fingerprint: &Fingerprint) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(fingerprint.as_str());
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// TESTS
// =============================================================================
