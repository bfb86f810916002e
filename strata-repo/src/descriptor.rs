//! Repository descriptors.
//!
//! A descriptor is the declarative binding of one (entity kind, property)
//! pair to a backend and its cache policy. Descriptors are registered at
//! startup; lookup failures at resolution time are configuration errors,
//! never silent no-ops.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use strata_cache::CacheLevel;
use strata_core::error::ConfigError;
use strata_core::{EntityKind, Operation, ResolutionConfig, SerializationMode};

/// The four backend families a descriptor can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Main keyed store, tenant-prefixed tables.
    Primary,
    /// Legacy keyed store on its own connection root.
    Legacy,
    /// Process-local key/value options store.
    Internal,
    /// Remote partner service behind the call executor.
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Primary => "primary",
            BackendKind::Legacy => "legacy",
            BackendKind::Internal => "internal",
            BackendKind::Remote => "remote",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-operation endpoint templates, each independently optional.
///
/// Only meaningful for the remote backend; keyed stores ignore endpoints
/// and dispatch on capability alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointSet {
    pub load: Option<String>,
    pub create: Option<String>,
    pub update: Option<String>,
    pub delete: Option<String>,
    pub synchronize: Option<String>,
}

impl EndpointSet {
    pub fn for_operation(&self, operation: Operation) -> Option<&str> {
        match operation {
            Operation::Load => self.load.as_deref(),
            Operation::Create => self.create.as_deref(),
            Operation::Update => self.update.as_deref(),
            Operation::Delete => self.delete.as_deref(),
            Operation::Synchronize => self.synchronize.as_deref(),
        }
    }
}

/// Binding of (kind, property) to a backend and cache policy.
#[derive(Debug, Clone)]
pub struct RepositoryDescriptor {
    pub kind: EntityKind,
    pub property: String,
    pub backend: BackendKind,
    pub endpoints: EndpointSet,
    pub cache_level: CacheLevel,
    /// TTL override; `None` falls back to the config default.
    pub ttl: Option<Duration>,
    pub serialization: SerializationMode,
    pub timeout: Duration,
}

impl RepositoryDescriptor {
    pub fn new(kind: EntityKind, property: impl Into<String>, backend: BackendKind) -> Self {
        Self {
            kind,
            property: property.into(),
            backend,
            endpoints: EndpointSet::default(),
            cache_level: CacheLevel::Memory,
            ttl: None,
            serialization: SerializationMode::Structural,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_endpoints(mut self, endpoints: EndpointSet) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_cache_level(mut self, level: CacheLevel) -> Self {
        self.cache_level = level;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_serialization(mut self, mode: SerializationMode) -> Self {
        self.serialization = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint template for an operation.
    ///
    /// A missing template means the operation is unsupported for this
    /// binding and must fail fast.
    pub fn endpoint_for(&self, operation: Operation) -> Result<&str, ConfigError> {
        self.endpoints
            .for_operation(operation)
            .ok_or(ConfigError::MissingEndpoint {
                kind: self.kind,
                operation,
            })
    }

    /// The TTL governing this descriptor's cache records.
    pub fn effective_ttl(&self, config: &ResolutionConfig) -> Duration {
        self.ttl.unwrap_or(config.default_ttl)
    }
}

/// Startup-time registry of descriptors, keyed by (kind, property).
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    descriptors: HashMap<(EntityKind, String), Arc<RepositoryDescriptor>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. Re-registering the same (kind, property)
    /// replaces the earlier binding; last registration wins.
    pub fn register(&mut self, descriptor: RepositoryDescriptor) {
        self.descriptors.insert(
            (descriptor.kind, descriptor.property.clone()),
            Arc::new(descriptor),
        );
    }

    /// Look up the descriptor for a (kind, property) pair.
    pub fn lookup(
        &self,
        kind: EntityKind,
        property: &str,
    ) -> Result<Arc<RepositoryDescriptor>, ConfigError> {
        self.descriptors
            .get(&(kind, property.to_string()))
            .cloned()
            .ok_or_else(|| ConfigError::DescriptorNotFound {
                kind,
                property: property.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
