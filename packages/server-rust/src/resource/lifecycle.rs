//! Two-phase resource initialization.
//!
//! A resource is constructed synchronously; resolving its backend and schema
//! set happens in a memoized shared future that every operation awaits.
//!
//! State machine: `Unresolved -> Resolving -> Ready | Failed`. `Failed` is
//! terminal: the error is reported to every caller and resolution is never
//! attempted again.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context as _;
use arc_swap::ArcSwap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use restkit_core::{DispatchError, DispatchResult, SchemaSet, Validator};
use tracing::{error, info};

use super::spec::ResourceSpec;
use crate::traits::{Backend, ComponentResolver};

/// Initialization state of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitState {
    /// Nothing has awaited the resource yet.
    Unresolved,
    /// Backend and schema resolution is in progress.
    Resolving,
    /// Components are resolved and immutable from here on.
    Ready,
    /// Resolution failed; the message is reported to every operation.
    Failed(Arc<str>),
}

impl InitState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::Resolving => "resolving",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

/// Components a resource resolved during initialization.
pub(crate) struct Resolved {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) schemas: Option<Arc<SchemaSet>>,
    /// One compiled validator per definition in `schemas`.
    pub(crate) validators: BTreeMap<String, Validator>,
}

type InitFuture = Shared<BoxFuture<'static, Result<Arc<Resolved>, Arc<str>>>>;

/// Owns the shared init future and the observable state.
pub(crate) struct Lifecycle {
    state: Arc<ArcSwap<InitState>>,
    init: InitFuture,
}

impl Lifecycle {
    /// Creates the init future without polling it.
    pub(crate) fn new(spec: &ResourceSpec, resolver: Arc<dyn ComponentResolver>) -> Self {
        let state = Arc::new(ArcSwap::from_pointee(InitState::Unresolved));

        let key = spec.key.clone();
        let backend_ref = spec.backend.clone();
        let schema_ref = spec.schema.clone();
        let observed = Arc::clone(&state);

        let init = async move {
            observed.store(Arc::new(InitState::Resolving));

            let outcome = async {
                let backend = resolver
                    .resolve_backend(backend_ref.key(), &backend_ref.config())
                    .await
                    .map_err(|e| {
                        e.context(format!("backend `{}` for resource `{key}`", backend_ref.key()))
                    })?;

                let schemas = match &schema_ref {
                    Some(schema_ref) => Some(Arc::new(
                        resolver.resolve_schemas(schema_ref.key()).await.map_err(|e| {
                            e.context(format!("schema `{}` for resource `{key}`", schema_ref.key()))
                        })?,
                    )),
                    None => None,
                };

                let mut validators = BTreeMap::new();
                for (name, definition) in schemas.iter().flat_map(|set| set.iter()) {
                    let validator = Validator::new(name.as_str(), definition.clone())
                        .with_context(|| format!("schema `{name}` for resource `{key}`"))?;
                    validators.insert(name.clone(), validator);
                }

                anyhow::Ok(Resolved {
                    backend,
                    schemas,
                    validators,
                })
            }
            .await;

            match outcome {
                Ok(resolved) => {
                    info!(resource = %key, "resource initialized");
                    observed.store(Arc::new(InitState::Ready));
                    Ok(Arc::new(resolved))
                }
                Err(e) => {
                    let message: Arc<str> = format!("{e:#}").into();
                    error!(resource = %key, error = %message, "resource initialization failed");
                    observed.store(Arc::new(InitState::Failed(Arc::clone(&message))));
                    Err(message)
                }
            }
        }
        .boxed()
        .shared();

        Self { state, init }
    }

    pub(crate) fn state(&self) -> InitState {
        InitState::clone(&self.state.load())
    }

    /// Waits for initialization, driving it if nobody has yet.
    pub(crate) async fn resolved(&self) -> DispatchResult<Arc<Resolved>> {
        if let InitState::Failed(message) = &**self.state.load() {
            return Err(DispatchError::configuration(message.to_string()));
        }
        self.init
            .clone()
            .await
            .map_err(|message| DispatchError::configuration(message.to_string()))
    }
}
