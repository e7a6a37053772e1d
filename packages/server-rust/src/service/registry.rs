use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};

use super::config::ServerConfig;
use crate::network::EndpointRegistry;

/// Context handed to services when they initialize.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub config: Arc<ServerConfig>,
    /// Routing table services mount their endpoints into.
    pub endpoints: Arc<EndpointRegistry>,
}

/// A component with a start/stop lifecycle driven by the [`ServiceRegistry`].
///
/// Initialized in registration order, shut down in reverse. The `Any` bound
/// enables typed lookup through [`ServiceRegistry::get`].
#[async_trait]
pub trait ManagedService: Send + Sync + Any {
    /// Unique name of this service (e.g. `"resources"`).
    fn name(&self) -> &'static str;

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()>;

    /// Return to the freshly initialized state (e.g. re-mount endpoints).
    async fn reset(&self) -> anyhow::Result<()>;

    /// Shut down. With `terminate`, skip graceful cleanup.
    async fn shutdown(&self, terminate: bool) -> anyhow::Result<()>;
}

struct Entry {
    name: &'static str,
    service: Arc<dyn ManagedService>,
    any: Arc<dyn Any + Send + Sync>,
}

/// Ordered set of lifecycle-managed services.
#[derive(Default)]
pub struct ServiceRegistry {
    entries: RwLock<Vec<Entry>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service. A service with the same name is replaced in place.
    pub fn register<T: ManagedService>(&self, service: T) {
        let name = service.name();
        let service = Arc::new(service);
        let entry = Entry {
            name,
            service: Arc::clone(&service) as Arc<dyn ManagedService>,
            any: service,
        };
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|e| e.name == name) {
            Some(slot) => *slot = entry,
            None => entries.push(entry),
        }
    }

    /// Looks a service up by its concrete type.
    #[must_use]
    pub fn get<T: ManagedService>(&self) -> Option<Arc<T>> {
        self.entries
            .read()
            .iter()
            .find_map(|e| Arc::clone(&e.any).downcast::<T>().ok())
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn ManagedService>> {
        self.entries
            .read()
            .iter()
            .find(|e| e.name == name)
            .map(|e| Arc::clone(&e.service))
    }

    /// Registered names in initialization order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.read().iter().map(|e| e.name).collect()
    }

    fn snapshot(&self) -> Vec<Arc<dyn ManagedService>> {
        self.entries
            .read()
            .iter()
            .map(|e| Arc::clone(&e.service))
            .collect()
    }

    /// Initializes every service in registration order.
    ///
    /// When one fails, the services initialized before it are shut down in
    /// reverse order and the original error is returned.
    ///
    /// # Errors
    ///
    /// Returns the first `init` error.
    pub async fn init_all(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        let services = self.snapshot();
        for (position, service) in services.iter().enumerate() {
            if let Err(e) = service.init(ctx).await {
                warn!(service = service.name(), error = %e, "service init failed; rolling back");
                for started in services[..position].iter().rev() {
                    if let Err(rollback) = started.shutdown(true).await {
                        warn!(service = started.name(), error = %rollback, "rollback shutdown failed");
                    }
                }
                return Err(e);
            }
            info!(service = service.name(), "service initialized");
        }
        Ok(())
    }

    /// Resets every service in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first `reset` error.
    pub async fn reset_all(&self) -> anyhow::Result<()> {
        for service in self.snapshot() {
            service.reset().await?;
        }
        Ok(())
    }

    /// Shuts every service down in reverse registration order.
    ///
    /// # Errors
    ///
    /// Returns the first `shutdown` error.
    pub async fn shutdown_all(&self, terminate: bool) -> anyhow::Result<()> {
        for service in self.snapshot().iter().rev() {
            service.shutdown(terminate).await?;
            info!(service = service.name(), "service stopped");
        }
        Ok(())
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        fail_init: bool,
        log: Log,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                fail_init: false,
                log: Arc::clone(log),
            }
        }
    }

    #[async_trait]
    impl ManagedService for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
            self.log.lock().push(format!("init:{}", self.name));
            if self.fail_init {
                anyhow::bail!("{} refused to start", self.name);
            }
            Ok(())
        }

        async fn reset(&self) -> anyhow::Result<()> {
            self.log.lock().push(format!("reset:{}", self.name));
            Ok(())
        }

        async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
            self.log.lock().push(format!("shutdown:{}", self.name));
            Ok(())
        }
    }

    struct Marker;

    #[async_trait]
    impl ManagedService for Marker {
        fn name(&self) -> &'static str {
            "marker"
        }
        async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
            Ok(())
        }
        async fn reset(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn ctx() -> ServiceContext {
        ServiceContext {
            config: Arc::new(ServerConfig::default()),
            endpoints: Arc::new(EndpointRegistry::new()),
        }
    }

    #[test]
    fn lookup_by_name_and_type() {
        let log = Log::default();
        let registry = ServiceRegistry::new();
        registry.register(Recorder::new("resources", &log));
        registry.register(Marker);

        assert_eq!(registry.get_by_name("resources").unwrap().name(), "resources");
        assert!(registry.get_by_name("missing").is_none());
        assert_eq!(registry.get::<Marker>().unwrap().name(), "marker");
        assert_eq!(registry.names(), vec!["resources", "marker"]);
    }

    #[test]
    fn re_registering_a_name_replaces_in_place() {
        let log = Log::default();
        let registry = ServiceRegistry::new();
        registry.register(Recorder::new("a", &log));
        registry.register(Marker);
        registry.register(Recorder::new("a", &log));
        assert_eq!(registry.names(), vec!["a", "marker"]);
    }

    #[tokio::test]
    async fn init_forward_shutdown_reverse() {
        let log = Log::default();
        let registry = ServiceRegistry::new();
        for name in ["first", "second", "third"] {
            registry.register(Recorder::new(name, &log));
        }

        registry.init_all(&ctx()).await.unwrap();
        registry.reset_all().await.unwrap();
        registry.shutdown_all(false).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "init:first",
                "init:second",
                "init:third",
                "reset:first",
                "reset:second",
                "reset:third",
                "shutdown:third",
                "shutdown:second",
                "shutdown:first",
            ]
        );
    }

    #[tokio::test]
    async fn failed_init_rolls_back_started_services() {
        let log = Log::default();
        let registry = ServiceRegistry::new();
        registry.register(Recorder::new("first", &log));
        registry.register(Recorder::new("second", &log));
        registry.register(Recorder {
            fail_init: true,
            ..Recorder::new("third", &log)
        });

        let err = registry.init_all(&ctx()).await.unwrap_err();
        assert!(err.to_string().contains("third"));
        assert_eq!(
            *log.lock(),
            vec![
                "init:first",
                "init:second",
                "init:third",
                "shutdown:second",
                "shutdown:first",
            ]
        );
    }
}
