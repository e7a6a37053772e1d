//! Operation handling: the per-request [`Operation`], the hook engine, the
//! default handlers with their override table, the dispatch core on
//! [`Resource`](crate::resource::Resource), and the service lifecycle registry.

pub mod config;
mod dispatch;
pub mod handlers;
pub mod hooks;
pub mod operation;
pub mod registry;

pub use config::ServerConfig;
pub use handlers::{DefaultHandler, HandlerFn, HandlerTable};
pub use hooks::{Hook, HookFn, HookSet, HookSetBuilder};
pub use operation::Operation;
pub use registry::{ManagedService, ServiceContext, ServiceRegistry};
