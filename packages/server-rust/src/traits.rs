use std::sync::Arc;

use async_trait::async_trait;
use restkit_core::{DispatchResult, SchemaSet};
use serde_json::Value;

use crate::service::Operation;

/// Storage capability behind a resource.
///
/// Each method receives the operation (id, payload, request context) and
/// resolves to the raw value the pipeline renders. `read` resolves to
/// `Value::Null` when the record does not exist. `create` is expected to
/// resolve to an insert acknowledgement (see [`restkit_core::InsertAck`]).
#[async_trait]
pub trait Backend: Send + Sync {
    async fn read(&self, op: &Operation) -> DispatchResult<Value>;

    async fn list(&self, op: &Operation) -> DispatchResult<Value>;

    async fn create(&self, op: &Operation) -> DispatchResult<Value>;

    async fn update(&self, op: &Operation) -> DispatchResult<Value>;

    async fn patch(&self, op: &Operation) -> DispatchResult<Value>;

    async fn remove(&self, op: &Operation) -> DispatchResult<Value>;
}

/// Resolves the components a resource declares by reference.
///
/// Stands in for the component loader: resources never construct their
/// backend or schemas themselves, they ask the resolver once during
/// initialization and keep the result for their lifetime.
#[async_trait]
pub trait ComponentResolver: Send + Sync {
    /// Resolve a backend by key, passing the inline config from the resource file.
    async fn resolve_backend(&self, key: &str, config: &Value) -> anyhow::Result<Arc<dyn Backend>>;

    /// Resolve the schema definitions registered under `key`.
    async fn resolve_schemas(&self, key: &str) -> anyhow::Result<SchemaSet>;
}
