//! HTTP handlers and the state they share.

pub mod api;
pub mod health;

pub use api::api_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use super::{EndpointRegistry, NetworkConfig, ServerStatus};
use crate::loader::ResourceLoader;

/// State handed to every axum handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Routing table of registered endpoint descriptors.
    pub endpoints: Arc<EndpointRegistry>,
    /// Loaded resources, reported by the health endpoints.
    pub resources: Arc<ResourceLoader>,
    /// Server phase and in-flight accounting.
    pub status: Arc<ServerStatus>,
    pub config: Arc<NetworkConfig>,
    /// Process start, for uptime.
    pub start_time: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(
        endpoints: Arc<EndpointRegistry>,
        resources: Arc<ResourceLoader>,
        status: Arc<ServerStatus>,
        config: NetworkConfig,
    ) -> Self {
        Self {
            endpoints,
            resources,
            status,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}
