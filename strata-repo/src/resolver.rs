//! Entity resolution engine.
//!
//! Control flow for a lazy property read: descriptor lookup, identity-map
//! check, cache read, backend dispatch, write-through, registry update.
//! Resolution is awaited inline on the request task; this layer spawns
//! nothing and retries nothing.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use strata_cache::{CacheManager, Fingerprint};
use strata_core::error::{ConfigError, StrataResult};
use strata_core::{
    EntityKind, EntityRecord, FailureMode, Operation, ResolutionConfig, UniqueKey,
};
use strata_remote::CallLedger;
use tracing::{debug, warn};

use crate::backend::{BackendAdapter, OperationContext};
use crate::descriptor::{BackendKind, DescriptorRegistry, RepositoryDescriptor};
use crate::registry::EntityRegistry;
use crate::tenant::TenantPrefixResolver;

/// The engine behind every lazy property access.
pub struct EntityResolver {
    config: ResolutionConfig,
    descriptors: DescriptorRegistry,
    registry: EntityRegistry,
    cache: Arc<CacheManager>,
    tenants: TenantPrefixResolver,
    backends: HashMap<BackendKind, Arc<dyn BackendAdapter>>,
    ledger: Option<Arc<CallLedger>>,
}

impl EntityResolver {
    pub fn new(
        config: ResolutionConfig,
        descriptors: DescriptorRegistry,
        cache: Arc<CacheManager>,
        tenants: TenantPrefixResolver,
    ) -> Self {
        Self {
            config,
            descriptors,
            registry: EntityRegistry::new(),
            cache,
            tenants,
            backends: HashMap::new(),
            ledger: None,
        }
    }

    /// Attach a backend adapter, keyed by its kind.
    pub fn with_backend(mut self, adapter: Arc<dyn BackendAdapter>) -> Self {
        self.backends.insert(adapter.kind(), adapter);
        self
    }

    /// Record cache-served resolutions in the given ledger.
    ///
    /// Wire-call recording stays with the executor; this resolver is the
    /// only component that knows a resolution never reached the wire.
    pub fn with_ledger(mut self, ledger: Arc<CallLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// The process-wide instance for (kind, key), created on first use.
    pub fn entity(&self, kind: EntityKind, key: UniqueKey) -> Arc<EntityRecord> {
        if let Some(existing) = self.registry.get(kind, &key) {
            return existing;
        }
        self.registry
            .register(Arc::new(EntityRecord::new(kind, key)))
    }

    /// Resolve a lazy property.
    ///
    /// The first call per (entity, property) consults cache and backend;
    /// every later call within the process returns the identical resolved
    /// value until it is explicitly invalidated. `Ok(None)` means resolved
    /// to nothing, including the soft-fail path.
    pub async fn resolve(
        &self,
        entity: &Arc<EntityRecord>,
        property: &str,
    ) -> StrataResult<Option<Value>> {
        // Read-your-writes: an already-resolved property never re-fetches.
        if let Some(value) = entity.property(property) {
            return Ok(value);
        }

        let descriptor = self.descriptors.lookup(entity.kind(), property)?;
        // Addressing is derived at the moment of use and scopes the cache
        // identity: the shared persistent tier must never serve one
        // tenant's payload to another.
        let address = self.tenants.resolve(entity.kind().name());
        let fingerprint = load_fingerprint(&descriptor, entity.key(), &address);

        if let Some(record) = self
            .cache
            .read(&self.config, descriptor.cache_level, &fingerprint)
            .await
        {
            let value = descriptor.serialization.decode(record.payload);
            self.record_cache_hit(&descriptor, entity, &value);
            entity.resolve_property(property, Some(value.clone()));
            return Ok(Some(value));
        }

        match self
            .dispatch(Operation::Load, entity, &descriptor, &address, Map::new())
            .await
        {
            Ok(Some(value)) => {
                let encoded = descriptor.serialization.encode(&value);
                self.cache
                    .write(
                        &self.config,
                        descriptor.cache_level,
                        &fingerprint,
                        encoded.clone(),
                        descriptor.effective_ttl(&self.config),
                    )
                    .await;
                // Read back through the same mapping the cache path uses,
                // so the first resolution and every cached one agree.
                let value = descriptor.serialization.decode(encoded);
                entity.resolve_property(property, Some(value.clone()));
                Ok(Some(value))
            }
            Ok(None) => {
                debug!(kind = %entity.kind(), key = %entity.key(), property, "backend resolved to nothing");
                entity.resolve_property(property, None);
                Ok(None)
            }
            Err(e) if self.config.failure_mode == FailureMode::Soft && e.is_suppressible() => {
                warn!(
                    kind = %entity.kind(),
                    key = %entity.key(),
                    property,
                    error = %e,
                    "resolution soft-failed"
                );
                entity.resolve_property(property, None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Perform a mutation through the property's backend.
    ///
    /// Mutations never soft-fail. On success the load fingerprint and the
    /// resolved property are invalidated so the next read re-fetches;
    /// deletes also evict the entity from the identity map.
    pub async fn mutate(
        &self,
        entity: &Arc<EntityRecord>,
        property: &str,
        operation: Operation,
        payload: Map<String, Value>,
    ) -> StrataResult<Option<Value>> {
        if !operation.is_mutation() {
            return Err(ConfigError::InvalidValue {
                field: "operation".to_string(),
                value: operation.to_string(),
                reason: "mutate only accepts mutating operations".to_string(),
            }
            .into());
        }

        let descriptor = self.descriptors.lookup(entity.kind(), property)?;
        let address = self.tenants.resolve(entity.kind().name());
        let result = self
            .dispatch(operation, entity, &descriptor, &address, payload)
            .await?;

        self.cache
            .invalidate(&load_fingerprint(&descriptor, entity.key(), &address))
            .await;
        entity.invalidate_property(property);
        if operation == Operation::Delete {
            self.registry.invalidate(entity.kind(), entity.key());
        }

        Ok(result)
    }

    /// Record a cache-served resolution, subject to the ledger toggles.
    fn record_cache_hit(
        &self,
        descriptor: &RepositoryDescriptor,
        entity: &EntityRecord,
        value: &Value,
    ) {
        let Some(ledger) = &self.ledger else { return };
        let endpoint = descriptor
            .endpoints
            .load
            .clone()
            .unwrap_or_else(|| format!("{}/{}", descriptor.kind, descriptor.property));
        let request = json!({
            "key": entity.key().as_str(),
            "property": descriptor.property,
        })
        .to_string();
        ledger.record(
            &self.config.ledger,
            &endpoint,
            &request,
            Some(&value.to_string()),
            true,
        );
    }

    async fn dispatch(
        &self,
        operation: Operation,
        entity: &Arc<EntityRecord>,
        descriptor: &RepositoryDescriptor,
        address: &str,
        params: Map<String, Value>,
    ) -> StrataResult<Option<Value>> {
        let adapter =
            self.backends
                .get(&descriptor.backend)
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "backend".to_string(),
                    value: descriptor.backend.to_string(),
                    reason: "no adapter registered for this backend kind".to_string(),
                })?;

        let ctx = OperationContext {
            config: &self.config,
            descriptor,
            key: entity.key(),
            address: address.to_string(),
            params,
        };
        adapter.perform(operation, &ctx).await
    }
}

/// The cache identity of a property load.
///
/// The tenant-resolved address is part of the identity: the persistent
/// tier is shared across processes and tenants, so two tenants loading
/// the same (kind, key) must hash to different fingerprints.
fn load_fingerprint(
    descriptor: &RepositoryDescriptor,
    key: &UniqueKey,
    address: &str,
) -> Fingerprint {
    let params = json!({
        "address": address,
        "key": key.as_str(),
        "property": descriptor.property,
    });
    Fingerprint::compute(descriptor.kind, Operation::Load, &params)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Mutex, RwLock};
    use std::time::Duration;
    use strata_cache::{CacheLevel, InMemoryStore};
    use strata_core::{LedgerOptions, StrataError, TenantContext};

    const DOMAIN: EntityKind = EntityKind::new("domain");

    /// Backend double that counts calls and records the addressing it saw.
    struct CountingAdapter {
        load_calls: AtomicU64,
        update_calls: AtomicU64,
        addresses: Mutex<Vec<String>>,
        result: Value,
        fail: bool,
    }

    impl CountingAdapter {
        fn returning(result: Value) -> Arc<Self> {
            Arc::new(Self {
                load_calls: AtomicU64::new(0),
                update_calls: AtomicU64::new(0),
                addresses: Mutex::new(Vec::new()),
                result,
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                load_calls: AtomicU64::new(0),
                update_calls: AtomicU64::new(0),
                addresses: Mutex::new(Vec::new()),
                result: Value::Null,
                fail: true,
            })
        }

        fn loads(&self) -> u64 {
            self.load_calls.load(Ordering::SeqCst)
        }

        fn updates(&self) -> u64 {
            self.update_calls.load(Ordering::SeqCst)
        }

        fn seen_addresses(&self) -> Vec<String> {
            self.addresses.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl BackendAdapter for CountingAdapter {
        fn kind(&self) -> BackendKind {
            BackendKind::Primary
        }

        async fn load(&self, ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
            self.load_calls.fetch_add(1, Ordering::SeqCst);
            self.addresses.lock().expect("lock").push(ctx.address.clone());
            if self.fail {
                return Err(StrataError::Backend("backend offline".to_string()));
            }
            Ok(Some(self.result.clone()))
        }

        async fn update(&self, _ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(self.result.clone()))
        }
    }

    fn tenant(prefix: &str) -> (Arc<RwLock<TenantContext>>, TenantPrefixResolver) {
        let ctx = Arc::new(RwLock::new(TenantContext::new(prefix)));
        let resolver = TenantPrefixResolver::new(ctx.clone());
        (ctx, resolver)
    }

    fn build(
        config: ResolutionConfig,
        descriptor: RepositoryDescriptor,
        adapter: Arc<CountingAdapter>,
        cache: Arc<CacheManager>,
    ) -> EntityResolver {
        let mut descriptors = DescriptorRegistry::new();
        descriptors.register(descriptor);
        let (_ctx, tenants) = tenant("t1_");
        EntityResolver::new(config, descriptors, cache, tenants).with_backend(adapter)
    }

    fn score_descriptor() -> RepositoryDescriptor {
        RepositoryDescriptor::new(DOMAIN, "seo_score", BackendKind::Primary)
            .with_cache_level(CacheLevel::Memory)
            .with_ttl(Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_idempotent_resolution_one_backend_call() {
        let adapter = CountingAdapter::returning(json!({"score": 87}));
        let resolver = build(
            ResolutionConfig::default(),
            score_descriptor(),
            adapter.clone(),
            Arc::new(CacheManager::memory_only()),
        );

        let entity = resolver.entity(DOMAIN, UniqueKey::new("example.com"));
        let again = resolver.entity(DOMAIN, UniqueKey::new("example.com"));
        assert!(Arc::ptr_eq(&entity, &again));

        let first = resolver.resolve(&entity, "seo_score").await.expect("resolve");
        let second = resolver.resolve(&entity, "seo_score").await.expect("resolve");
        assert_eq!(first, Some(json!({"score": 87})));
        assert_eq!(first, second);
        assert_eq!(adapter.loads(), 1);
    }

    #[tokio::test]
    async fn test_ttl_governs_refetch() {
        let adapter = CountingAdapter::returning(json!(1));
        let descriptor = score_descriptor().with_ttl(Duration::from_millis(30));
        let resolver = build(
            ResolutionConfig::default(),
            descriptor,
            adapter.clone(),
            Arc::new(CacheManager::memory_only()),
        );
        let entity = resolver.entity(DOMAIN, UniqueKey::new("example.com"));

        resolver.resolve(&entity, "seo_score").await.expect("resolve");

        // Within the TTL a re-read after property invalidation is served
        // from cache.
        entity.invalidate_property("seo_score");
        resolver.resolve(&entity, "seo_score").await.expect("resolve");
        assert_eq!(adapter.loads(), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        entity.invalidate_property("seo_score");
        resolver.resolve(&entity, "seo_score").await.expect("resolve");
        assert_eq!(adapter.loads(), 2);
    }

    #[tokio::test]
    async fn test_kill_switch_reaches_backend_every_time() {
        let adapter = CountingAdapter::returning(json!(1));
        let resolver = build(
            ResolutionConfig::default().with_cache_disabled(),
            score_descriptor(),
            adapter.clone(),
            Arc::new(CacheManager::memory_only()),
        );
        let entity = resolver.entity(DOMAIN, UniqueKey::new("example.com"));

        resolver.resolve(&entity, "seo_score").await.expect("resolve");
        entity.invalidate_property("seo_score");
        resolver.resolve(&entity, "seo_score").await.expect("resolve");
        // The descriptor's TTL is irrelevant once the kill-switch is on.
        assert_eq!(adapter.loads(), 2);
    }

    #[tokio::test]
    async fn test_tenant_switch_changes_addressing() {
        let adapter = CountingAdapter::returning(json!(1));
        let mut descriptors = DescriptorRegistry::new();
        descriptors.register(score_descriptor());
        let (ctx, tenants) = tenant("t1_");
        let resolver = EntityResolver::new(
            ResolutionConfig::default(),
            descriptors,
            Arc::new(CacheManager::memory_only()),
            tenants,
        )
        .with_backend(adapter.clone());

        let a = resolver.entity(DOMAIN, UniqueKey::new("a.com"));
        resolver.resolve(&a, "seo_score").await.expect("resolve");

        ctx.write().expect("lock").switch_to("t2_");

        let b = resolver.entity(DOMAIN, UniqueKey::new("b.com"));
        resolver.resolve(&b, "seo_score").await.expect("resolve");

        assert_eq!(adapter.seen_addresses(), vec!["t1_domain", "t2_domain"]);
    }

    #[tokio::test]
    async fn test_cache_is_tenant_scoped_across_shared_store() {
        let cache = Arc::new(CacheManager::with_store(Arc::new(InMemoryStore::new())));
        let descriptor = score_descriptor().with_cache_level(CacheLevel::MemoryAndStore);

        let adapter_one = CountingAdapter::returning(json!({"owner": "tenant-one"}));
        let adapter_two = CountingAdapter::returning(json!({"owner": "tenant-two"}));

        let mut descriptors_one = DescriptorRegistry::new();
        descriptors_one.register(descriptor.clone());
        let (_ctx_one, tenants_one) = tenant("t1_");
        let resolver_one = EntityResolver::new(
            ResolutionConfig::default(),
            descriptors_one,
            cache.clone(),
            tenants_one,
        )
        .with_backend(adapter_one.clone());

        let mut descriptors_two = DescriptorRegistry::new();
        descriptors_two.register(descriptor);
        let (_ctx_two, tenants_two) = tenant("t2_");
        let resolver_two = EntityResolver::new(
            ResolutionConfig::default(),
            descriptors_two,
            cache,
            tenants_two,
        )
        .with_backend(adapter_two.clone());

        let one = resolver_one.entity(DOMAIN, UniqueKey::new("example.com"));
        let first = resolver_one.resolve(&one, "seo_score").await.expect("resolve");
        assert_eq!(first, Some(json!({"owner": "tenant-one"})));

        // Same (kind, key) under the second tenant: the shared tiers must
        // not serve the first tenant's payload.
        let two = resolver_two.entity(DOMAIN, UniqueKey::new("example.com"));
        let second = resolver_two.resolve(&two, "seo_score").await.expect("resolve");
        assert_eq!(second, Some(json!({"owner": "tenant-two"})));
        assert_eq!(adapter_one.loads(), 1);
        assert_eq!(adapter_two.loads(), 1);
    }

    #[tokio::test]
    async fn test_soft_failure_resolves_to_none() {
        let adapter = CountingAdapter::failing();
        let resolver = build(
            ResolutionConfig::default(),
            score_descriptor(),
            adapter.clone(),
            Arc::new(CacheManager::memory_only()),
        );
        let entity = resolver.entity(DOMAIN, UniqueKey::new("example.com"));

        let value = resolver.resolve(&entity, "seo_score").await.expect("soft-fail");
        assert_eq!(value, None);
        // Resolved-to-nothing, not unresolved: the failed fetch is not
        // repeated on the next read.
        assert!(entity.is_resolved("seo_score"));
        resolver.resolve(&entity, "seo_score").await.expect("soft-fail");
        assert_eq!(adapter.loads(), 1);
    }

    #[tokio::test]
    async fn test_strict_failure_raises() {
        let adapter = CountingAdapter::failing();
        let resolver = build(
            ResolutionConfig::default().with_failure_mode(FailureMode::Strict),
            score_descriptor(),
            adapter,
            Arc::new(CacheManager::memory_only()),
        );
        let entity = resolver.entity(DOMAIN, UniqueKey::new("example.com"));

        let err = resolver
            .resolve(&entity, "seo_score")
            .await
            .expect_err("strict mode should raise");
        assert!(matches!(err, StrataError::Backend(_)));
        assert!(!entity.is_resolved("seo_score"));
    }

    #[tokio::test]
    async fn test_unknown_property_is_config_error() {
        let adapter = CountingAdapter::returning(json!(1));
        let resolver = build(
            ResolutionConfig::default(),
            score_descriptor(),
            adapter,
            Arc::new(CacheManager::memory_only()),
        );
        let entity = resolver.entity(DOMAIN, UniqueKey::new("example.com"));

        let err = resolver
            .resolve(&entity, "no_such_property")
            .await
            .expect_err("lookup should fail");
        assert!(matches!(
            err,
            StrataError::Config(ConfigError::DescriptorNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_ledger_records_cache_served_resolutions() {
        let ledger = Arc::new(CallLedger::new());
        let options = LedgerOptions {
            enabled: true,
            log_cache_hits: true,
            ..LedgerOptions::default()
        };
        let adapter = CountingAdapter::returning(json!({"score": 87}));
        let resolver = build(
            ResolutionConfig::default().with_ledger(options),
            score_descriptor(),
            adapter,
            Arc::new(CacheManager::memory_only()),
        )
        .with_ledger(ledger.clone());
        let entity = resolver.entity(DOMAIN, UniqueKey::new("example.com"));

        // The first resolution reaches the backend; wire recording is the
        // executor's concern, so nothing lands here.
        resolver.resolve(&entity, "seo_score").await.expect("resolve");
        assert!(ledger.is_empty());

        entity.invalidate_property("seo_score");
        resolver.resolve(&entity, "seo_score").await.expect("resolve");

        let entries = ledger.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].cache_served);
        assert!(entries[0].request.contains("seo_score"));
    }

    #[tokio::test]
    async fn test_ledger_skips_cache_hits_unless_opted_in() {
        let ledger = Arc::new(CallLedger::new());
        let options = LedgerOptions {
            enabled: true,
            log_cache_hits: false,
            ..LedgerOptions::default()
        };
        let adapter = CountingAdapter::returning(json!(1));
        let resolver = build(
            ResolutionConfig::default().with_ledger(options),
            score_descriptor(),
            adapter,
            Arc::new(CacheManager::memory_only()),
        )
        .with_ledger(ledger.clone());
        let entity = resolver.entity(DOMAIN, UniqueKey::new("example.com"));

        resolver.resolve(&entity, "seo_score").await.expect("resolve");
        entity.invalidate_property("seo_score");
        resolver.resolve(&entity, "seo_score").await.expect("resolve");

        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_mutation_invalidates_cache_and_property() {
        let adapter = CountingAdapter::returning(json!({"score": 1}));
        let resolver = build(
            ResolutionConfig::default(),
            score_descriptor(),
            adapter.clone(),
            Arc::new(CacheManager::memory_only()),
        );
        let entity = resolver.entity(DOMAIN, UniqueKey::new("example.com"));

        resolver.resolve(&entity, "seo_score").await.expect("resolve");
        assert_eq!(adapter.loads(), 1);

        resolver
            .mutate(&entity, "seo_score", Operation::Update, Map::new())
            .await
            .expect("update should succeed");
        assert_eq!(adapter.updates(), 1);
        assert!(!entity.is_resolved("seo_score"));

        // The stale cached record is gone; the next read re-fetches.
        resolver.resolve(&entity, "seo_score").await.expect("resolve");
        assert_eq!(adapter.loads(), 2);
    }

    #[tokio::test]
    async fn test_mutate_rejects_load() {
        let adapter = CountingAdapter::returning(json!(1));
        let resolver = build(
            ResolutionConfig::default(),
            score_descriptor(),
            adapter,
            Arc::new(CacheManager::memory_only()),
        );
        let entity = resolver.entity(DOMAIN, UniqueKey::new("example.com"));

        let err = resolver
            .mutate(&entity, "seo_score", Operation::Load, Map::new())
            .await
            .expect_err("load through mutate is a misuse");
        assert!(matches!(
            err,
            StrataError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_persistent_round_trip_without_second_backend_call() {
        let adapter = CountingAdapter::returning(json!({
            "domain": "example.com",
            "score": 87,
            "tags": ["seo", "content"],
        }));
        let descriptor = score_descriptor().with_cache_level(CacheLevel::MemoryAndStore);
        let cache = Arc::new(CacheManager::with_store(Arc::new(InMemoryStore::new())));
        let resolver = build(ResolutionConfig::default(), descriptor, adapter.clone(), cache);
        let entity = resolver.entity(DOMAIN, UniqueKey::new("example.com"));

        let first = resolver.resolve(&entity, "seo_score").await.expect("resolve");

        // Wipe the process-local state; only the persistent tier remains.
        resolver.cache().clear_memory();
        entity.invalidate_property("seo_score");

        let second = resolver.resolve(&entity, "seo_score").await.expect("resolve");
        assert_eq!(first, second, "store round trip must be field-for-field equal");
        assert_eq!(adapter.loads(), 1);
    }

    #[tokio::test]
    async fn test_projection_mode_shapes_resolved_value() {
        let adapter = CountingAdapter::returning(json!({
            "domain": "example.com",
            "score": 87,
            "internal_secret": "x",
        }));
        let descriptor = score_descriptor().with_serialization(
            strata_core::SerializationMode::Projection {
                fields: vec!["domain".into(), "score".into()],
            },
        );
        let resolver = build(
            ResolutionConfig::default(),
            descriptor,
            adapter,
            Arc::new(CacheManager::memory_only()),
        );
        let entity = resolver.entity(DOMAIN, UniqueKey::new("example.com"));

        let value = resolver.resolve(&entity, "seo_score").await.expect("resolve");
        assert_eq!(value, Some(json!({"domain": "example.com", "score": 87})));

        // A cached re-read goes through the same mapping and agrees.
        entity.invalidate_property("seo_score");
        let again = resolver.resolve(&entity, "seo_score").await.expect("resolve");
        assert_eq!(value, again);
    }
}
