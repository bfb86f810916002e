//! Strata Core - Entity Identity Types
//!
//! Pure data structures shared by every other crate: entity identity,
//! lazy property state, the error taxonomy, and the resolution
//! configuration object. No backend logic lives here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

pub mod config;
pub mod error;
pub mod tenant;

pub use config::{FailureMode, LedgerOptions, RejectionPolicy, ResolutionConfig};
pub use error::{
    AuthError, CacheError, ConfigError, RemoteError, StrataError, StrataResult,
};
pub use tenant::TenantContext;

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Compute the hex-encoded SHA-256 digest of arbitrary bytes.
///
/// Used for cache fingerprints and request signatures so that both sides
/// agree on one hashing convention.
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

// ============================================================================
// ENTITY KIND
// ============================================================================

/// Discriminator for entity types.
///
/// Kinds are an open set: consumers declare them at descriptor-registration
/// time rather than this crate enumerating every domain type. The inner
/// name must be unique per logical entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityKind(&'static str);

impl EntityKind {
    /// Declare an entity kind by its canonical name.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The canonical name of this kind.
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

// ============================================================================
// UNIQUE KEY
// ============================================================================

/// Origin-independent logical identity of an entity.
///
/// The same logical entity must produce the same key no matter which
/// backend materialized it, so keys are derived from natural fields and
/// normalized (trimmed, lowercased) before joining.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueKey(String);

impl UniqueKey {
    /// Wrap an already-normalized key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive a key from natural identity fields.
    ///
    /// Each part is trimmed and lowercased, then the parts are joined with
    /// `|`. Backends that capitalize or pad the same fields therefore
    /// still converge on one key.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = parts
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .collect::<Vec<_>>()
            .join("|");
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// The capability set every backend is dispatched over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Load,
    Create,
    Update,
    Delete,
    Synchronize,
}

impl Operation {
    /// Stable lowercase name, used in fingerprints and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Load => "load",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Synchronize => "synchronize",
        }
    }

    /// True for operations that mutate backend state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Operation::Load)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SERIALIZATION MODE
// ============================================================================

/// How a resolved value is shaped before it enters the cache.
///
/// `Structural` round-trips the value exactly. `Projection` keeps only the
/// named fields of an object; it is lossy and only acceptable because the
/// read path applies the identical mapping, and a projected payload is
/// never used as entity identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SerializationMode {
    /// Full, reversible form.
    Structural,
    /// Lossy projection onto the named fields.
    Projection { fields: Vec<String> },
}

impl SerializationMode {
    /// Shape a value for cache storage.
    pub fn encode(&self, value: &Value) -> Value {
        match self {
            SerializationMode::Structural => value.clone(),
            SerializationMode::Projection { fields } => project(value, fields),
        }
    }

    /// Shape a cached payload back into a property value.
    ///
    /// For projections this re-applies the field filter, so a payload
    /// written by an older projection never leaks extra fields.
    pub fn decode(&self, value: Value) -> Value {
        match self {
            SerializationMode::Structural => value,
            SerializationMode::Projection { fields } => project(&value, fields),
        }
    }
}

fn project(value: &Value, fields: &[String]) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for field in fields {
                if let Some(v) = map.get(field) {
                    out.insert(field.clone(), v.clone());
                }
            }
            Value::Object(out)
        }
        // Non-object values have no fields to project; pass through.
        other => other.clone(),
    }
}

// ============================================================================
// ENTITY RECORD
// ============================================================================

/// A resolved-or-resolving entity instance.
///
/// This is the identity wrapper the registry hands out: backend `id` is
/// nullable (an entity may exist logically before any backend assigned it
/// an id), `key` is the origin-independent identity, and properties are
/// filled in lazily as descriptors resolve them.
///
/// Property state is interior-mutable so that shared `Arc<EntityRecord>`
/// handles observe a resolution performed by any reader (read-your-writes
/// within the request).
#[derive(Debug)]
pub struct EntityRecord {
    id: Option<String>,
    kind: EntityKind,
    key: UniqueKey,
    attributes: serde_json::Map<String, Value>,
    properties: RwLock<HashMap<String, Option<Value>>>,
}

impl EntityRecord {
    pub fn new(kind: EntityKind, key: UniqueKey) -> Self {
        Self {
            id: None,
            kind,
            key,
            attributes: serde_json::Map::new(),
            properties: RwLock::new(HashMap::new()),
        }
    }

    /// Attach the backend-assigned id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach eagerly-known attributes (fields that needed no resolution).
    pub fn with_attributes(mut self, attributes: serde_json::Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn key(&self) -> &UniqueKey {
        &self.key
    }

    pub fn attributes(&self) -> &serde_json::Map<String, Value> {
        &self.attributes
    }

    /// Read a lazily-resolved property.
    ///
    /// Outer `None` means the property has never been resolved; inner
    /// `None` means resolution completed and produced no value (the
    /// soft-fail outcome).
    pub fn property(&self, name: &str) -> Option<Option<Value>> {
        self.properties
            .read()
            .ok()
            .and_then(|props| props.get(name).cloned())
    }

    /// True once a property has been resolved, even to `None`.
    pub fn is_resolved(&self, name: &str) -> bool {
        self.properties
            .read()
            .map(|props| props.contains_key(name))
            .unwrap_or(false)
    }

    /// Record the outcome of a resolution.
    pub fn resolve_property(&self, name: impl Into<String>, value: Option<Value>) {
        if let Ok(mut props) = self.properties.write() {
            props.insert(name.into(), value);
        }
    }

    /// Forget a resolved property so the next read re-consults its backend.
    pub fn invalidate_property(&self, name: &str) {
        if let Ok(mut props) = self.properties.write() {
            props.remove(name);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
