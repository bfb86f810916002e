//! # Strata Repo
//!
//! The resolution engine: descriptors bind (entity kind, property) pairs
//! to backends and cache policy, the [`EntityRegistry`] keeps one
//! instance per logical entity, the [`TenantPrefixResolver`] rewrites
//! storage addressing per active tenant, and the [`EntityResolver`] ties
//! them together with the cache and remote layers.
//!
//! Typical wiring:
//!
//! ```no_run
//! use std::sync::{Arc, RwLock};
//! use strata_cache::CacheManager;
//! use strata_core::{EntityKind, ResolutionConfig, TenantContext, UniqueKey};
//! use strata_repo::{
//!     BackendKind, DescriptorRegistry, EntityResolver, KeyedStore,
//!     RepositoryDescriptor, TenantPrefixResolver,
//! };
//!
//! # async fn wire() -> strata_core::StrataResult<()> {
//! const DOMAIN: EntityKind = EntityKind::new("domain");
//!
//! let mut descriptors = DescriptorRegistry::new();
//! descriptors.register(RepositoryDescriptor::new(
//!     DOMAIN,
//!     "seo_score",
//!     BackendKind::Primary,
//! ));
//!
//! let tenant = Arc::new(RwLock::new(TenantContext::new("t1_")));
//! let resolver = EntityResolver::new(
//!     ResolutionConfig::default(),
//!     descriptors,
//!     Arc::new(CacheManager::memory_only()),
//!     TenantPrefixResolver::new(tenant),
//! )
//! .with_backend(Arc::new(KeyedStore::primary()));
//!
//! let entity = resolver.entity(DOMAIN, UniqueKey::new("example.com"));
//! let score = resolver.resolve(&entity, "seo_score").await?;
//! # let _ = score;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod descriptor;
pub mod registry;
pub mod resolver;
pub mod tenant;

pub use backend::{
    BackendAdapter, InternalStore, KeyedStore, OperationContext, RemoteServiceAdapter,
};
pub use descriptor::{BackendKind, DescriptorRegistry, EndpointSet, RepositoryDescriptor};
pub use registry::EntityRegistry;
pub use resolver::EntityResolver;
pub use tenant::TenantPrefixResolver;
