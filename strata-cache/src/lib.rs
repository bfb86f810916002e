//! Two-tier call cache with TTL governance.
//!
//! Calls are identified by a deterministic [`Fingerprint`] of their kind,
//! operation, and normalized parameters. Results live in an in-process
//! tier and, for TTLs above zero, a persistent [`CacheStore`] tier shared
//! across processes.
//!
//! # Contracts
//!
//! - TTL zero means memory-only: the record never reaches the persistent
//!   tier and never expires within the process.
//! - The persistent tier is strictly best-effort; its failures are logged
//!   and treated as misses, never surfaced to resolution.
//! - Records are immutable once written until expiry; overwrites are
//!   last-write-wins per fingerprint.

pub mod fingerprint;
pub mod lmdb_store;
pub mod manager;
pub mod memory;
pub mod record;
pub mod store;

pub use fingerprint::Fingerprint;
pub use lmdb_store::{LmdbStore, LmdbStoreError};
pub use manager::{CacheManager, CacheStats};
pub use memory::MemoryTier;
pub use record::{CacheLevel, CacheRecord};
pub use store::{CacheStore, InMemoryStore};
