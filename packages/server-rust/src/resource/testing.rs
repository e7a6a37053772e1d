//! Shared fixtures for resource, dispatch and pipeline tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use restkit_core::{
    DispatchResult, FieldDef, FieldKind, OperationKind, SchemaDefinition, SchemaSet,
};
use serde_json::Value;

use super::{Resource, ResourceBuilder, ResourceSpec};
use crate::service::{HandlerTable, HookSetBuilder, Operation};
use crate::storage::{MemoryBackend, StaticResolver};
use crate::traits::{Backend, ComponentResolver};

/// `{ name: string (required) }`, registered as `widget`.
pub(crate) fn widget_schema() -> SchemaDefinition {
    SchemaDefinition {
        title: Some("Widget".to_string()),
        fields: vec![FieldDef {
            name: "name".to_string(),
            required: true,
            kind: Some(FieldKind::String),
            pattern: None,
        }],
        additional_fields: true,
    }
}

/// Resolver with the `widget` schema registered.
pub(crate) fn widget_resolver() -> StaticResolver {
    let resolver = StaticResolver::new();
    resolver.register_schema("widget", widget_schema());
    resolver
}

/// Resolver that counts calls and hands out memory backends.
#[derive(Default)]
pub(crate) struct CountingResolver {
    pub(crate) backend_calls: AtomicUsize,
    pub(crate) schema_calls: AtomicUsize,
    fail_backends: bool,
}

#[async_trait]
impl ComponentResolver for CountingResolver {
    async fn resolve_backend(&self, key: &str, _config: &Value) -> anyhow::Result<Arc<dyn Backend>> {
        self.backend_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_backends {
            anyhow::bail!("backend `{key}` is not available");
        }
        Ok(Arc::new(MemoryBackend::new()))
    }

    async fn resolve_schemas(&self, key: &str) -> anyhow::Result<SchemaSet> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        let mut set = SchemaSet::new();
        set.insert(key.to_string(), widget_schema());
        Ok(set)
    }
}

/// A [`CountingResolver`] whose backend resolution always fails.
pub(crate) fn failing_resolver() -> Arc<CountingResolver> {
    Arc::new(CountingResolver {
        fail_backends: true,
        ..CountingResolver::default()
    })
}

/// Resource backed by an empty memory store, no schema, no hooks.
pub(crate) fn memory_resource(key: &str) -> Arc<Resource> {
    Resource::new(ResourceSpec::new(key, "memory"), Arc::new(StaticResolver::new()))
        .expect("valid spec")
}

/// Memory-backed resource declaring the `widget` schema.
pub(crate) fn schema_resource(key: &str) -> Arc<Resource> {
    Resource::new(
        ResourceSpec::new(key, "memory").with_schema("widget"),
        Arc::new(widget_resolver()),
    )
    .expect("valid spec")
}

/// Memory-backed resource with the given hooks.
pub(crate) fn resource_with_hooks(key: &str, hooks: HookSetBuilder) -> Arc<Resource> {
    Resource::from_parts(
        ResourceSpec::new(key, "memory"),
        hooks.build(),
        HandlerTable::new(),
        Arc::new(StaticResolver::new()),
    )
    .expect("valid spec")
}

/// Backend answering every call with a canned value and recording what it saw.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    responses: Mutex<[Option<Value>; OperationKind::COUNT]>,
    calls: Mutex<Vec<(OperationKind, Option<Value>)>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sets the value returned for `kind`. Unscripted kinds return `null`.
    pub(crate) fn respond(self: &Arc<Self>, kind: OperationKind, value: Value) -> Arc<Self> {
        self.responses.lock()[kind.index()] = Some(value);
        Arc::clone(self)
    }

    /// Kinds called so far, with the payload each call observed.
    pub(crate) fn calls(&self) -> Vec<(OperationKind, Option<Value>)> {
        self.calls.lock().clone()
    }

    fn answer(&self, kind: OperationKind, op: &Operation) -> DispatchResult<Value> {
        self.calls.lock().push((kind, op.payload().cloned()));
        Ok(self.responses.lock()[kind.index()].clone().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn read(&self, op: &Operation) -> DispatchResult<Value> {
        self.answer(OperationKind::Read, op)
    }

    async fn list(&self, op: &Operation) -> DispatchResult<Value> {
        self.answer(OperationKind::List, op)
    }

    async fn create(&self, op: &Operation) -> DispatchResult<Value> {
        self.answer(OperationKind::Create, op)
    }

    async fn update(&self, op: &Operation) -> DispatchResult<Value> {
        self.answer(OperationKind::Update, op)
    }

    async fn patch(&self, op: &Operation) -> DispatchResult<Value> {
        self.answer(OperationKind::Patch, op)
    }

    async fn remove(&self, op: &Operation) -> DispatchResult<Value> {
        self.answer(OperationKind::Remove, op)
    }
}

/// Builds a resource whose backend key resolves to `backend`. The `widget`
/// schema is available to specs that reference it.
pub(crate) fn resource_with_backend(
    spec: ResourceSpec,
    backend: Arc<dyn Backend>,
    configure: impl FnOnce(ResourceBuilder) -> ResourceBuilder,
) -> Arc<Resource> {
    let resolver = widget_resolver();
    resolver.register_backend(spec.backend.key(), backend);
    configure(Resource::builder(spec))
        .build(Arc::new(resolver))
        .expect("valid spec")
}

/// Layer recording the level of every event it sees.
#[derive(Clone, Default)]
pub(crate) struct EventLevels(Arc<Mutex<Vec<tracing::Level>>>);

impl EventLevels {
    /// A subscriber feeding this recorder.
    pub(crate) fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        use tracing_subscriber::layer::SubscriberExt;
        tracing_subscriber::registry().with(self.clone())
    }

    pub(crate) fn count(&self, level: tracing::Level) -> usize {
        self.0.lock().iter().filter(|l| **l == level).count()
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventLevels {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        self.0.lock().push(*event.metadata().level());
    }
}
