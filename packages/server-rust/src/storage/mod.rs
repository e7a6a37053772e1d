//! Reference capabilities: an in-memory [`Backend`](crate::traits::Backend)
//! and a registry-backed [`ComponentResolver`](crate::traits::ComponentResolver).

pub mod memory;
pub mod resolver;

pub use memory::MemoryBackend;
pub use resolver::{StaticResolver, MEMORY_BACKEND};
