//! Two-tier cache manager.
//!
//! Read path: memory hit wins; on a memory miss the persistent store is
//! consulted (when the level allows it), and an unexpired store record is
//! promoted into memory. Anything else is a miss and the caller fetches
//! from its backend, then writes through both tiers.
//!
//! The persistent tier is best-effort by contract: every store error is
//! logged and treated as a miss so resolution can continue.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use strata_core::ResolutionConfig;
use tracing::warn;

use crate::fingerprint::Fingerprint;
use crate::memory::MemoryTier;
use crate::record::{CacheLevel, CacheRecord};
use crate::store::CacheStore;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits (either tier).
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Store records promoted into the memory tier.
    pub promotions: u64,
    /// Persistent-tier errors that were swallowed.
    pub store_errors: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TTL-governed two-tier cache keyed by call fingerprint.
pub struct CacheManager {
    memory: MemoryTier,
    store: Option<Arc<dyn CacheStore>>,
    stats: RwLock<CacheStats>,
}

impl CacheManager {
    /// A manager with no persistent tier; `MemoryAndStore` levels degrade
    /// to memory-only.
    pub fn memory_only() -> Self {
        Self {
            memory: MemoryTier::new(),
            store: None,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// A manager backed by the given persistent store.
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        Self {
            memory: MemoryTier::new(),
            store: Some(store),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Read a cached record for `fingerprint` at the effective level.
    ///
    /// The global kill-switch in `config` forces the effective level to
    /// `None`, making every caller reach its backend.
    pub async fn read(
        &self,
        config: &ResolutionConfig,
        level: CacheLevel,
        fingerprint: &Fingerprint,
    ) -> Option<CacheRecord> {
        let level = self.effective_level(config, level);
        if !level.uses_memory() {
            self.record_miss();
            return None;
        }

        if let Some(record) = self.memory.get(fingerprint) {
            self.record_hit();
            return Some(record);
        }

        if level.uses_store() {
            if let Some(record) = self.read_store(fingerprint).await {
                self.memory.put(record.clone());
                if let Ok(mut stats) = self.stats.write() {
                    stats.promotions += 1;
                }
                self.record_hit();
                return Some(record);
            }
        }

        self.record_miss();
        None
    }

    /// Write a freshly-fetched payload through both tiers.
    ///
    /// TTL zero keeps the record memory-only; the persistent tier only
    /// sees records with a real expiry. Store failures are logged and
    /// swallowed.
    pub async fn write(
        &self,
        config: &ResolutionConfig,
        level: CacheLevel,
        fingerprint: &Fingerprint,
        payload: Value,
        ttl: Duration,
    ) {
        let level = self.effective_level(config, level);
        if !level.uses_memory() {
            return;
        }

        let record = CacheRecord::new(fingerprint.clone(), payload, ttl);
        self.memory.put(record.clone());

        if level.uses_store() && record.is_persistable() {
            if let Some(store) = &self.store {
                if let Err(e) = store.put(&record).await {
                    warn!(fingerprint = %fingerprint, error = %e, "persistent cache write failed");
                    if let Ok(mut stats) = self.stats.write() {
                        stats.store_errors += 1;
                    }
                }
            }
        }
    }

    /// Drop a fingerprint from both tiers.
    pub async fn invalidate(&self, fingerprint: &Fingerprint) {
        self.memory.remove(fingerprint);
        if let Some(store) = &self.store {
            if let Err(e) = store.delete(fingerprint).await {
                warn!(fingerprint = %fingerprint, error = %e, "persistent cache delete failed");
                if let Ok(mut stats) = self.stats.write() {
                    stats.store_errors += 1;
                }
            }
        }
    }

    /// Clear the process-local tier (end of request/process).
    pub fn clear_memory(&self) {
        self.memory.clear();
    }

    /// Sweep expired records out of the persistent tier.
    pub async fn purge_expired(&self) -> u64 {
        let Some(store) = &self.store else { return 0 };
        match store.purge_expired(Utc::now()).await {
            Ok(purged) => purged,
            Err(e) => {
                warn!(error = %e, "persistent cache purge failed");
                if let Ok(mut stats) = self.stats.write() {
                    stats.store_errors += 1;
                }
                0
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().map(|s| s.clone()).unwrap_or_default()
    }

    fn record_hit(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.hits += 1;
        }
    }

    fn record_miss(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.misses += 1;
        }
    }

    fn effective_level(&self, config: &ResolutionConfig, level: CacheLevel) -> CacheLevel {
        if !config.cache_enabled {
            CacheLevel::None
        } else {
            level
        }
    }

    /// Best-effort store read. Expired records are deleted in passing.
    async fn read_store(&self, fingerprint: &Fingerprint) -> Option<CacheRecord> {
        let store = self.store.as_ref()?;
        match store.get(fingerprint).await {
            Ok(Some(record)) => {
                if record.is_expired() {
                    if let Err(e) = store.delete(fingerprint).await {
                        warn!(fingerprint = %fingerprint, error = %e, "expired record delete failed");
                    }
                    None
                } else {
                    Some(record)
                }
            }
            Ok(None) => None,
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "persistent cache read failed, treating as miss");
                if let Ok(mut stats) = self.stats.write() {
                    stats.store_errors += 1;
                }
                None
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
