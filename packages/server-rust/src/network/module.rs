//! Network module with deferred startup.
//!
//! `new()` allocates shared state, `start()` binds the listener and
//! `serve()` accepts connections until the shutdown future resolves. The
//! registry can be filled between `new()` and `serve()`.

use std::future::Future;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::handlers::{api_handler, health_handler, liveness_handler, readiness_handler, AppState};
use super::middleware::with_http_layers;
use super::registry::EndpointRegistry;
use super::status::ServerStatus;
use crate::loader::ResourceLoader;

/// Owns the listener and the state shared with handlers.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    endpoints: Arc<EndpointRegistry>,
    resources: Arc<ResourceLoader>,
    status: Arc<ServerStatus>,
}

impl NetworkModule {
    /// Creates the module without binding a port.
    #[must_use]
    pub fn new(config: NetworkConfig, resources: Arc<ResourceLoader>) -> Self {
        Self {
            config,
            listener: None,
            endpoints: Arc::new(EndpointRegistry::new()),
            resources,
            status: Arc::new(ServerStatus::new()),
        }
    }

    /// The routing table the loader mounts endpoints into.
    #[must_use]
    pub fn endpoints(&self) -> Arc<EndpointRegistry> {
        Arc::clone(&self.endpoints)
    }

    #[must_use]
    pub fn status(&self) -> Arc<ServerStatus> {
        Arc::clone(&self.status)
    }

    /// Assembles the router.
    ///
    /// - `GET /health` detailed health JSON
    /// - `GET /health/live` liveness check
    /// - `GET /health/ready` readiness check
    /// - everything else goes to the endpoint registry
    pub fn build_router(&self) -> Router {
        let state = AppState::new(
            Arc::clone(&self.endpoints),
            Arc::clone(&self.resources),
            Arc::clone(&self.status),
            self.config.clone(),
        );

        let router = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .fallback(api_handler);

        with_http_layers(router, &self.config).with_state(state)
    }

    /// Binds the listener and returns the bound port (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!("listening on {}:{}", self.config.host, port);
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    ///
    /// # Errors
    ///
    /// Fails when `start()` was not called, when TLS material cannot be
    /// loaded, or on a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router();
        let status = Arc::clone(&self.status);

        let draining = Arc::clone(&status);
        let signal = async move {
            shutdown.await;
            info!("shutdown requested; draining");
            draining.begin_drain();
        };

        status.mark_ready();

        match &self.config.tls {
            Some(tls) => serve_tls(listener, router, tls, signal).await?,
            None => {
                info!("serving plain HTTP");
                axum::serve(listener, router)
                    .with_graceful_shutdown(signal)
                    .await?;
            }
        }

        if status.drained(self.config.drain_timeout).await {
            info!("all requests drained");
        } else {
            warn!(in_flight = status.in_flight(), "drain timeout expired");
        }
        Ok(())
    }
}

/// Serves TLS with `axum-server`, reusing the bound listener.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: &TlsConfig,
    signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS certificates: {e}"))?;

    let addr = listener.local_addr()?;
    let handle = axum_server::Handle::new();
    let trigger = handle.clone();
    tokio::spawn(async move {
        signal.await;
        trigger.graceful_shutdown(None);
    });

    info!("serving TLS on {addr}");
    axum_server::from_tcp_rustls(listener.into_std()?, rustls)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}
