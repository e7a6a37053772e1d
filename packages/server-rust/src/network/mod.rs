//! HTTP surface: configuration, the endpoint registry, handlers, layers and
//! the server lifecycle.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod registry;
pub mod status;

pub use config::*;
pub use handlers::AppState;
pub use module::NetworkModule;
pub use registry::{EndpointRegistry, PathPattern, RegistryError, RouteMatch};
pub use status::{InFlight, ServerPhase, ServerStatus};
