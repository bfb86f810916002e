//! Backend adapters.
//!
//! One capability trait covers all four backend families; descriptors
//! select the implementation by [`BackendKind`]. Every operation a
//! backend does not support fails fast with a configuration error so a
//! miswired descriptor can never silently no-op.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};
use strata_core::error::{ConfigError, StrataError, StrataResult};
use strata_core::{Operation, ResolutionConfig, UniqueKey};
use strata_remote::{RemoteBody, RemoteCall, RemoteCallExecutor};

use crate::descriptor::{BackendKind, RepositoryDescriptor};

/// Everything a backend needs to perform one operation.
#[derive(Debug)]
pub struct OperationContext<'a> {
    pub config: &'a ResolutionConfig,
    pub descriptor: &'a RepositoryDescriptor,
    pub key: &'a UniqueKey,
    /// Tenant-resolved storage address for this call.
    pub address: String,
    /// Operation parameters; doubles as the payload for mutations.
    pub params: Map<String, Value>,
}

fn unsupported(backend: BackendKind, operation: Operation) -> StrataError {
    ConfigError::UnsupportedOperation {
        backend: backend.as_str().to_string(),
        operation,
    }
    .into()
}

/// Capability set every backend is dispatched over.
///
/// Defaults make each operation unsupported; implementations override
/// exactly what their store can do.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn load(&self, _ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        Err(unsupported(self.kind(), Operation::Load))
    }

    async fn create(&self, _ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        Err(unsupported(self.kind(), Operation::Create))
    }

    async fn update(&self, _ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        Err(unsupported(self.kind(), Operation::Update))
    }

    async fn delete(&self, _ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        Err(unsupported(self.kind(), Operation::Delete))
    }

    async fn synchronize(&self, _ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        Err(unsupported(self.kind(), Operation::Synchronize))
    }

    /// Dispatch an operation to its method.
    async fn perform(
        &self,
        operation: Operation,
        ctx: &OperationContext<'_>,
    ) -> StrataResult<Option<Value>> {
        match operation {
            Operation::Load => self.load(ctx).await,
            Operation::Create => self.create(ctx).await,
            Operation::Update => self.update(ctx).await,
            Operation::Delete => self.delete(ctx).await,
            Operation::Synchronize => self.synchronize(ctx).await,
        }
    }
}

// =============================================================================
// KEYED STORES (PRIMARY / LEGACY)
// =============================================================================

/// Keyed table store used for both the primary and the legacy database.
///
/// Tables are addressed by the tenant-resolved name in the operation
/// context, rows by unique key. The two database families differ only in
/// connection root, so one adapter serves both kinds.
#[derive(Debug)]
pub struct KeyedStore {
    kind: BackendKind,
    tables: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl KeyedStore {
    pub fn primary() -> Self {
        Self::with_kind(BackendKind::Primary)
    }

    pub fn legacy() -> Self {
        Self::with_kind(BackendKind::Legacy)
    }

    fn with_kind(kind: BackendKind) -> Self {
        Self {
            kind,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Put a row directly, bypassing dispatch (bootstrap and tests).
    pub fn seed(&self, table: &str, key: &str, value: Value) {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }
}

#[async_trait]
impl BackendAdapter for KeyedStore {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn load(&self, ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        Ok(tables
            .get(&ctx.address)
            .and_then(|rows| rows.get(ctx.key.as_str()))
            .cloned())
    }

    async fn create(&self, ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        let row = Value::Object(ctx.params.clone());
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables
            .entry(ctx.address.clone())
            .or_default()
            .insert(ctx.key.as_str().to_string(), row.clone());
        Ok(Some(row))
    }

    async fn update(&self, ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let rows = tables.entry(ctx.address.clone()).or_default();
        let row = match rows.get_mut(ctx.key.as_str()) {
            // Merge into the existing row so partial updates keep
            // untouched fields.
            Some(Value::Object(existing)) => {
                for (field, value) in &ctx.params {
                    existing.insert(field.clone(), value.clone());
                }
                Value::Object(existing.clone())
            }
            _ => {
                let row = Value::Object(ctx.params.clone());
                rows.insert(ctx.key.as_str().to_string(), row.clone());
                row
            }
        };
        Ok(Some(row))
    }

    async fn delete(&self, ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        Ok(tables
            .get_mut(&ctx.address)
            .and_then(|rows| rows.remove(ctx.key.as_str())))
    }
}

// =============================================================================
// INTERNAL OPTIONS STORE
// =============================================================================

/// Process-local key/value options store.
///
/// Option names are tenant-prefixed through the address in the operation
/// context, so two tenants sharing a process cannot see each other's
/// options.
#[derive(Debug, Default)]
pub struct InternalStore {
    options: RwLock<HashMap<String, Value>>,
}

impl InternalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn option_name(ctx: &OperationContext<'_>) -> String {
        format!("{}:{}", ctx.address, ctx.key)
    }
}

#[async_trait]
impl BackendAdapter for InternalStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Internal
    }

    async fn load(&self, ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        let options = self.options.read().unwrap_or_else(|e| e.into_inner());
        Ok(options.get(&Self::option_name(ctx)).cloned())
    }

    async fn create(&self, ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        let value = Value::Object(ctx.params.clone());
        let mut options = self.options.write().unwrap_or_else(|e| e.into_inner());
        options.insert(Self::option_name(ctx), value.clone());
        Ok(Some(value))
    }

    async fn update(&self, ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        self.create(ctx).await
    }

    async fn delete(&self, ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        let mut options = self.options.write().unwrap_or_else(|e| e.into_inner());
        Ok(options.remove(&Self::option_name(ctx)))
    }
}

// =============================================================================
// REMOTE SERVICE
// =============================================================================

/// Remote backend: every operation becomes an executor call against the
/// descriptor's endpoint template for that operation.
#[derive(Debug)]
pub struct RemoteServiceAdapter {
    executor: Arc<RemoteCallExecutor>,
}

impl RemoteServiceAdapter {
    pub fn new(executor: Arc<RemoteCallExecutor>) -> Self {
        Self { executor }
    }

    async fn call(
        &self,
        operation: Operation,
        ctx: &OperationContext<'_>,
    ) -> StrataResult<Option<Value>> {
        let template = ctx.descriptor.endpoint_for(operation)?.to_string();

        let mut path_params: HashMap<String, String> = ctx
            .params
            .iter()
            .map(|(name, value)| (name.clone(), stringify(value)))
            .collect();
        path_params.insert("KEY".to_string(), ctx.key.as_str().to_string());

        let call = RemoteCall {
            template,
            path_params,
            scope: ctx.descriptor.kind.name().to_string(),
            payload: ctx.params.clone(),
            timeout: ctx.descriptor.timeout,
        };

        let body = self.executor.execute(ctx.config, call).await?;
        Ok(body.map(|body| match body {
            RemoteBody::Json(value) => value,
            RemoteBody::Text(text) => Value::String(text),
        }))
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl BackendAdapter for RemoteServiceAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn load(&self, ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        self.call(Operation::Load, ctx).await
    }

    async fn create(&self, ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        self.call(Operation::Create, ctx).await
    }

    async fn update(&self, ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        self.call(Operation::Update, ctx).await
    }

    async fn delete(&self, ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        self.call(Operation::Delete, ctx).await
    }

    async fn synchronize(&self, ctx: &OperationContext<'_>) -> StrataResult<Option<Value>> {
        self.call(Operation::Synchronize, ctx).await
    }
}

// =============================================================================
// TESTS
// =============================================================================
