use std::future::Future;
use std::sync::Arc;

use restkit_core::{DispatchResult, OperationKind, Phase};

use super::{Resource, ResourceSpec, SpecError};
use crate::service::{DefaultHandler, HandlerTable, Hook, HookSetBuilder, Operation};
use crate::traits::ComponentResolver;

/// Attaches hooks and handler overrides to a spec before the resource is built.
///
/// ```ignore
/// let widgets = Resource::builder(ResourceSpec::new("widgets", "memory"))
///     .pre(Hook::new(OperationKind::Create, stamp_owner).with_priority(1))
///     .handler(OperationKind::Remove, |op, default| async move {
///         audit(&op);
///         default.call(op).await
///     })
///     .build(resolver)?;
/// ```
#[derive(Debug)]
pub struct ResourceBuilder {
    spec: ResourceSpec,
    hooks: HookSetBuilder,
    handlers: HandlerTable,
}

impl ResourceBuilder {
    #[must_use]
    pub fn new(spec: ResourceSpec) -> Self {
        Self {
            spec,
            hooks: HookSetBuilder::new(),
            handlers: HandlerTable::new(),
        }
    }

    /// Adds a hook that runs before the handler.
    #[must_use]
    pub fn pre(mut self, hook: Hook) -> Self {
        self.hooks.add(Phase::Pre, hook);
        self
    }

    /// Adds a hook that runs after the handler.
    #[must_use]
    pub fn post(mut self, hook: Hook) -> Self {
        self.hooks.add(Phase::Post, hook);
        self
    }

    /// Replaces the default handler for `kind`.
    #[must_use]
    pub fn handler<F, Fut>(mut self, kind: OperationKind, func: F) -> Self
    where
        F: Fn(Operation, DefaultHandler) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<Operation>> + Send + 'static,
    {
        self.handlers.set(kind, func);
        self
    }

    /// Builds the resource. Component resolution is deferred to first use.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] when the spec fails validation.
    pub fn build(self, resolver: Arc<dyn ComponentResolver>) -> Result<Arc<Resource>, SpecError> {
        Resource::from_parts(self.spec, self.hooks.build(), self.handlers, resolver)
    }
}
