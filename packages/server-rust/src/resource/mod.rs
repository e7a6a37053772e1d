//! REST resources: declarative spec, lazy component resolution, and the
//! handle every operation and endpoint is bound to.

mod builder;
mod lifecycle;
pub mod spec;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use restkit_core::{DispatchError, DispatchResult, SchemaSet, Validator};

pub use builder::ResourceBuilder;
pub use lifecycle::InitState;
pub use spec::{ComponentRef, DetailedRef, ResourceSpec, SpecError};

use crate::pipeline::{build_endpoints, EndpointDescriptor};
use crate::service::{HandlerTable, HookSet};
use crate::traits::{Backend, ComponentResolver};
use lifecycle::{Lifecycle, Resolved};

/// One REST-exposed entity with its hooks and handler overrides.
///
/// Construction returns immediately. Backend and schema resolution runs once,
/// the first time anything awaits the resource, and its outcome is shared by
/// every later caller. Hooks and handlers are immutable after construction.
pub struct Resource {
    spec: ResourceSpec,
    hooks: HookSet,
    handlers: HandlerTable,
    lifecycle: Lifecycle,
}

impl Resource {
    /// Creates a resource without hooks or handler overrides.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] when the spec fails validation.
    pub fn new(
        spec: ResourceSpec,
        resolver: Arc<dyn ComponentResolver>,
    ) -> Result<Arc<Self>, SpecError> {
        Self::builder(spec).build(resolver)
    }

    /// Starts a builder to attach hooks and handler overrides.
    #[must_use]
    pub fn builder(spec: ResourceSpec) -> ResourceBuilder {
        ResourceBuilder::new(spec)
    }

    pub(crate) fn from_parts(
        spec: ResourceSpec,
        hooks: HookSet,
        handlers: HandlerTable,
        resolver: Arc<dyn ComponentResolver>,
    ) -> Result<Arc<Self>, SpecError> {
        spec.validate()?;
        let lifecycle = Lifecycle::new(&spec, resolver);
        Ok(Arc::new(Self {
            spec,
            hooks,
            handlers,
            lifecycle,
        }))
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.spec.key
    }

    /// URL segment: the path override or the key.
    #[must_use]
    pub fn segment(&self) -> &str {
        self.spec.segment()
    }

    #[must_use]
    pub fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    #[must_use]
    pub fn hooks(&self) -> &HookSet {
        &self.hooks
    }

    #[must_use]
    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    /// Whether the resource declares a schema reference.
    #[must_use]
    pub fn has_schema(&self) -> bool {
        self.spec.schema.is_some()
    }

    /// Current initialization state.
    #[must_use]
    pub fn state(&self) -> InitState {
        self.lifecycle.state()
    }

    /// Waits until the backend and schema set are resolved.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] when resolution failed, on
    /// this call or any earlier one.
    pub async fn ready(&self) -> DispatchResult<()> {
        self.lifecycle.resolved().await.map(|_| ())
    }

    async fn resolved(&self) -> DispatchResult<Arc<Resolved>> {
        self.lifecycle.resolved().await
    }

    /// The resolved backend.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when initialization failed.
    pub async fn backend(&self) -> DispatchResult<Arc<dyn Backend>> {
        Ok(Arc::clone(&self.resolved().await?.backend))
    }

    /// The resolved schema set, `None` when the resource declares no schema.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when initialization failed.
    pub async fn schemas(&self) -> DispatchResult<Option<Arc<SchemaSet>>> {
        Ok(self.resolved().await?.schemas.clone())
    }

    /// The compiled validator for the named definition of the resolved
    /// schema set. Patterns are compiled once, during initialization.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when initialization failed, when the
    /// resource declares no schema, or when the set has no such definition.
    pub async fn get_schema(&self, name: &str) -> DispatchResult<Validator> {
        let resolved = self.resolved().await?;
        if resolved.schemas.is_none() {
            return Err(DispatchError::configuration(format!(
                "resource `{}` declares no schema",
                self.key()
            )));
        }
        resolved.validators.get(name).cloned().ok_or_else(|| {
            DispatchError::configuration(format!(
                "schema `{name}` not found for resource `{}`",
                self.key()
            ))
        })
    }

    /// The validator for the resource's own schema reference.
    ///
    /// # Errors
    ///
    /// As [`get_schema`](Self::get_schema).
    pub async fn validator(&self) -> DispatchResult<Option<Validator>> {
        match &self.spec.schema {
            Some(schema_ref) => self.get_schema(schema_ref.key()).await.map(Some),
            None => Ok(None),
        }
    }

    /// The six endpoint descriptors for this resource, once it is ready.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when initialization failed.
    pub async fn endpoints(self: &Arc<Self>) -> DispatchResult<Vec<EndpointDescriptor>> {
        self.ready().await?;
        Ok(build_endpoints(self))
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("key", &self.spec.key)
            .field("segment", &self.segment())
            .field("state", &self.state())
            .field("hooks", &self.hooks.len())
            .field("handlers", &self.handlers)
            .finish_non_exhaustive()
    }
}
