//! Registry-backed [`ComponentResolver`].

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use dashmap::DashMap;
use restkit_core::{SchemaDefinition, SchemaSet};
use serde_json::Value;
use tracing::{debug, info};

use super::memory::MemoryBackend;
use crate::traits::{Backend, ComponentResolver};

/// Resolves backends and schema sets registered ahead of time.
///
/// The `"memory"` backend key is built in: each resolution hands out a fresh
/// [`MemoryBackend`], so resources sharing the key never share records.
#[derive(Default)]
pub struct StaticResolver {
    backends: DashMap<String, Arc<dyn Backend>>,
    schemas: DashMap<String, SchemaSet>,
}

/// Backend key that resolves to an empty in-memory store.
pub const MEMORY_BACKEND: &str = "memory";

impl StaticResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `backend` under `key`, replacing any previous registration.
    pub fn register_backend(&self, key: impl Into<String>, backend: Arc<dyn Backend>) -> &Self {
        self.backends.insert(key.into(), backend);
        self
    }

    /// Registers a whole schema set under `key`.
    pub fn register_schemas(&self, key: impl Into<String>, schemas: SchemaSet) -> &Self {
        self.schemas.insert(key.into(), schemas);
        self
    }

    /// Registers a single definition as a set containing only itself, named `key`.
    pub fn register_schema(&self, key: impl Into<String>, definition: SchemaDefinition) -> &Self {
        let key = key.into();
        let mut set = SchemaSet::new();
        set.insert(key.clone(), definition);
        self.register_schemas(key, set)
    }

    /// Loads every `*.json` file in `dir` as a schema definition named after
    /// the file stem. Returns the number of schemas loaded.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be read, a file is not a valid
    /// schema definition, or one of its field patterns does not compile.
    pub async fn load_schema_dir(&self, dir: impl AsRef<Path>) -> anyhow::Result<usize> {
        let dir = dir.as_ref();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .with_context(|| format!("reading schema directory {}", dir.display()))?;

        let mut loaded = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let raw = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading schema {}", path.display()))?;
            let definition: SchemaDefinition = serde_json::from_slice(&raw)
                .with_context(|| format!("parsing schema {}", path.display()))?;
            definition
                .compile_patterns()
                .with_context(|| format!("compiling schema {}", path.display()))?;
            debug!(schema = stem, path = %path.display(), "loaded schema");
            self.register_schema(stem, definition);
            loaded += 1;
        }

        info!(dir = %dir.display(), count = loaded, "schema directory loaded");
        Ok(loaded)
    }
}

impl std::fmt::Debug for StaticResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut backends: Vec<String> = self.backends.iter().map(|e| e.key().clone()).collect();
        let mut schemas: Vec<String> = self.schemas.iter().map(|e| e.key().clone()).collect();
        backends.sort();
        schemas.sort();
        f.debug_struct("StaticResolver")
            .field("backends", &backends)
            .field("schemas", &schemas)
            .finish()
    }
}

#[async_trait]
impl ComponentResolver for StaticResolver {
    async fn resolve_backend(&self, key: &str, config: &Value) -> anyhow::Result<Arc<dyn Backend>> {
        if let Some(backend) = self.backends.get(key) {
            return Ok(Arc::clone(backend.value()));
        }
        if key == MEMORY_BACKEND {
            let seed = config
                .get("records")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            return Ok(Arc::new(MemoryBackend::with_records(seed)));
        }
        anyhow::bail!("no backend registered under `{key}`")
    }

    async fn resolve_schemas(&self, key: &str) -> anyhow::Result<SchemaSet> {
        self.schemas
            .get(key)
            .map(|set| set.value().clone())
            .ok_or_else(|| anyhow::anyhow!("no schema registered under `{key}`"))
    }
}
