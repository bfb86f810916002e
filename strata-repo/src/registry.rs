//! Entity registry.
//!
//! Process-scoped identity map: at most one resolved instance per
//! (kind, unique key). The registry is what makes a second resolution of
//! the same logical entity within a request free, and what guarantees
//! read-your-writes on lazily resolved properties.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use strata_core::{EntityKind, EntityRecord, UniqueKey};

/// Identity map over (kind, unique key).
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entries: RwLock<HashMap<(EntityKind, UniqueKey), Arc<EntityRecord>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registered instance for (kind, key), if any.
    pub fn get(&self, kind: EntityKind, key: &UniqueKey) -> Option<Arc<EntityRecord>> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(kind, key.clone()))
            .cloned()
    }

    /// Register an entity, or return the already-registered instance.
    ///
    /// First registration wins: a second register for the same identity
    /// hands back the existing `Arc` so every holder shares one instance
    /// and one resolution state.
    pub fn register(&self, entity: Arc<EntityRecord>) -> Arc<EntityRecord> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries
            .entry((entity.kind(), entity.key().clone()))
            .or_insert(entity)
            .clone()
    }

    /// Drop an identity so the next access re-resolves from scratch.
    pub fn invalidate(&self, kind: EntityKind, key: &UniqueKey) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&(kind, key.clone()));
    }

    /// Discard every entry (end of request/process).
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// TESTS
// =============================================================================
