//! LMDB-backed persistent cache tier.
//!
//! Uses the heed crate (Rust bindings for LMDB) so that cached call
//! results survive process restarts and are visible to sibling processes
//! sharing the same environment directory.
//!
//! # Value Format
//!
//! Each value is framed as:
//! - Bytes 0-7: created_at, millisecond UNIX timestamp, little-endian
//! - Bytes 8-15: expires_at in the same encoding, zero when the record
//!   has no expiry
//! - Remainder: JSON payload

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use strata_core::CacheError;

use crate::fingerprint::Fingerprint;
use crate::record::CacheRecord;
use crate::store::CacheStore;

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for CacheError {
    fn from(e: LmdbStoreError) -> Self {
        CacheError::StoreUnavailable {
            reason: e.to_string(),
        }
    }
}

/// LMDB-backed cache store keyed by fingerprint.
pub struct LmdbStore {
    env: Env,
    db: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open (or create) an LMDB store under `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }

    fn encode_value(record: &CacheRecord) -> Result<Vec<u8>, LmdbStoreError> {
        let payload = serde_json::to_vec(&record.payload)
            .map_err(|e| LmdbStoreError::Serialization(e.to_string()))?;

        let mut bytes = Vec::with_capacity(16 + payload.len());
        bytes.extend_from_slice(&record.created_at.timestamp_millis().to_le_bytes());
        let expires_millis = record
            .expires_at
            .map(|t| t.timestamp_millis())
            .unwrap_or(0);
        bytes.extend_from_slice(&expires_millis.to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    fn decode_value(
        fingerprint: Fingerprint,
        bytes: &[u8],
    ) -> Result<CacheRecord, LmdbStoreError> {
        if bytes.len() < 16 {
            return Err(LmdbStoreError::Deserialization(
                "value shorter than timestamp frame".to_string(),
            ));
        }

        let created_millis = i64::from_le_bytes(
            bytes[0..8]
                .try_into()
                .map_err(|_| LmdbStoreError::Deserialization("invalid created_at".into()))?,
        );
        let expires_millis = i64::from_le_bytes(
            bytes[8..16]
                .try_into()
                .map_err(|_| LmdbStoreError::Deserialization("invalid expires_at".into()))?,
        );

        let created_at = DateTime::from_timestamp_millis(created_millis)
            .ok_or_else(|| LmdbStoreError::Deserialization("created_at out of range".into()))?;
        let expires_at = if expires_millis == 0 {
            None
        } else {
            Some(
                DateTime::from_timestamp_millis(expires_millis).ok_or_else(|| {
                    LmdbStoreError::Deserialization("expires_at out of range".into())
                })?,
            )
        };

        let payload = serde_json::from_slice(&bytes[16..])
            .map_err(|e| LmdbStoreError::Deserialization(e.to_string()))?;

        Ok(CacheRecord {
            fingerprint,
            payload,
            created_at,
            expires_at,
        })
    }
}

#[async_trait]
impl CacheStore for LmdbStore {
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheRecord>, CacheError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        match self.db.get(&rtxn, fingerprint.as_bytes()) {
            Ok(Some(bytes)) => {
                let record = Self::decode_value(fingerprint.clone(), bytes)?;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(LmdbStoreError::Transaction(e.to_string()).into()),
        }
    }

    async fn put(&self, record: &CacheRecord) -> Result<(), CacheError> {
        let value = Self::encode_value(record)?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, record.fingerprint.as_bytes(), &value)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, fingerprint: &Fingerprint) -> Result<(), CacheError> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        self.db
            .delete(&mut wtxn, fingerprint.as_bytes())
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, CacheError> {
        // Collect keys under a read transaction first; LMDB does not allow
        // deleting while iterating the same cursor.
        let expired_keys: Vec<Vec<u8>> = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

            let iter = self
                .db
                .iter(&rtxn)
                .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

            let now_millis = now.timestamp_millis();
            let mut keys = Vec::new();
            for result in iter {
                let Ok((key, value)) = result else { continue };
                if value.len() < 16 {
                    continue;
                }
                let Ok(expires_bytes) = <[u8; 8]>::try_from(&value[8..16]) else {
                    continue;
                };
                let expires_millis = i64::from_le_bytes(expires_bytes);
                if expires_millis != 0 && expires_millis <= now_millis {
                    keys.push(key.to_vec());
                }
            }
            keys
        };

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut deleted = 0u64;
        for key in &expired_keys {
            if self.db.delete(&mut wtxn, key).unwrap_or(false) {
                deleted += 1;
            }
        }

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(deleted)
    }
}

// =============================================================================
// TESTS
// =============================================================================
