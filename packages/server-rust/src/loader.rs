//! Resource loader: collects resources and registers their endpoints.
//!
//! Resources are added in code or read from a directory of
//! `*.resource.json` files. Starting the loader awaits each resource's
//! endpoints and hands them to the [`EndpointRegistry`]; stopping it takes
//! them back out. The loader is a [`ManagedService`], so the service
//! registry drives both steps.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::network::EndpointRegistry;
use crate::pipeline::EndpointDescriptor;
use crate::resource::{Resource, ResourceSpec, SpecError};
use crate::service::{ManagedService, ServiceContext};
use crate::traits::ComponentResolver;

/// File suffix picked up by [`ResourceLoader::load_dir`].
pub const RESOURCE_FILE_SUFFIX: &str = ".resource.json";

/// Errors raised while adding resources.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("resource `{0}` is already loaded")]
    Duplicate(String),
    #[error(transparent)]
    Spec(#[from] SpecError),
}

/// Registered endpoints, kept so `stop` can unregister them.
struct Mounted {
    registry: Arc<EndpointRegistry>,
    endpoints: Vec<EndpointDescriptor>,
}

/// Owns the loaded resources and their registration state.
pub struct ResourceLoader {
    resolver: Arc<dyn ComponentResolver>,
    resources: RwLock<Vec<Arc<Resource>>>,
    mounted: Mutex<Option<Mounted>>,
    strict: bool,
}

impl ResourceLoader {
    #[must_use]
    pub fn new(resolver: Arc<dyn ComponentResolver>) -> Self {
        Self {
            resolver,
            resources: RwLock::new(Vec::new()),
            mounted: Mutex::new(None),
            strict: false,
        }
    }

    /// When strict, `start` fails on the first resource that cannot
    /// initialize instead of skipping it.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Adds a built resource.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Duplicate`] when the key is already loaded.
    pub fn add(&self, resource: Arc<Resource>) -> Result<(), LoaderError> {
        let mut resources = self.resources.write();
        if resources.iter().any(|r| r.key() == resource.key()) {
            return Err(LoaderError::Duplicate(resource.key().to_string()));
        }
        resources.push(resource);
        Ok(())
    }

    /// Builds a resource from a spec with this loader's resolver and adds it.
    ///
    /// # Errors
    ///
    /// Returns an error when the spec is invalid or the key is already loaded.
    pub fn add_spec(&self, spec: ResourceSpec) -> Result<Arc<Resource>, LoaderError> {
        let resource = Resource::new(spec, Arc::clone(&self.resolver))?;
        self.add(Arc::clone(&resource))?;
        Ok(resource)
    }

    /// Adds every `*.resource.json` file in `dir`, in file name order.
    /// Returns the number of resources added.
    ///
    /// # Errors
    ///
    /// Fails on the first unreadable directory, invalid file or duplicate key.
    pub async fn load_dir(&self, dir: impl AsRef<Path>) -> anyhow::Result<usize> {
        let dir = dir.as_ref();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("reading resource directory {}", dir.display()))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_resource = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(RESOURCE_FILE_SUFFIX));
            if is_resource {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let spec = ResourceSpec::from_json(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            let resource = self
                .add_spec(spec)
                .with_context(|| format!("loading {}", path.display()))?;
            info!(resource = %resource.key(), path = %path.display(), "resource loaded");
        }
        Ok(paths.len())
    }

    #[must_use]
    pub fn resources(&self) -> Vec<Arc<Resource>> {
        self.resources.read().clone()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<Resource>> {
        self.resources.read().iter().find(|r| r.key() == key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }

    /// Awaits every resource's endpoints and registers them.
    ///
    /// Resources that fail to initialize are logged and skipped (their
    /// failure stays visible through health) unless the loader is strict.
    /// Returns the number of endpoints registered.
    ///
    /// # Errors
    ///
    /// Fails on a route conflict, or on an initialization failure when strict.
    pub async fn start(&self, registry: &Arc<EndpointRegistry>) -> anyhow::Result<usize> {
        let mut mounted = Vec::new();
        for resource in self.resources() {
            let endpoints = match resource.endpoints().await {
                Ok(endpoints) => endpoints,
                Err(e) if self.strict => {
                    registry.unregister(&mounted);
                    return Err(e).with_context(|| format!("starting resource `{}`", resource.key()));
                }
                Err(e) => {
                    error!(resource = %resource.key(), error = %e, "resource not mounted");
                    continue;
                }
            };
            if let Err(e) = registry.register(&endpoints) {
                registry.unregister(&mounted);
                return Err(e.into());
            }
            info!(resource = %resource.key(), path = %resource.segment(), "resource mounted");
            mounted.extend(endpoints);
        }

        let count = mounted.len();
        let previous = self.mounted.lock().replace(Mounted {
            registry: Arc::clone(registry),
            endpoints: mounted,
        });
        if let Some(previous) = previous {
            warn!("loader started twice; unregistering the earlier endpoints");
            previous.registry.unregister(&previous.endpoints);
        }
        Ok(count)
    }

    /// Unregisters everything `start` registered. No-op when not started.
    pub fn stop(&self) {
        if let Some(mounted) = self.mounted.lock().take() {
            mounted.registry.unregister(&mounted.endpoints);
            info!(endpoints = mounted.endpoints.len(), "resources unmounted");
        }
    }
}

impl std::fmt::Debug for ResourceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.resources.read().iter().map(|r| r.key().to_string()).collect();
        f.debug_struct("ResourceLoader")
            .field("resources", &keys)
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ManagedService for ResourceLoader {
    fn name(&self) -> &'static str {
        "resources"
    }

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        let count = self.start(&ctx.endpoints).await?;
        info!(resources = self.len(), endpoints = count, "resource loader started");
        Ok(())
    }

    async fn reset(&self) -> anyhow::Result<()> {
        let registry = self.mounted.lock().as_ref().map(|m| Arc::clone(&m.registry));
        self.stop();
        if let Some(registry) = registry {
            self.start(&registry).await?;
        }
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        self.stop();
        Ok(())
    }
}
