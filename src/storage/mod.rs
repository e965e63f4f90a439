// src/storage/mod.rs

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod traits;

pub use memory::InMemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;
pub use traits::{PurgeBatch, RegistryStore};

/// Namespace segment placed between the configured key prefix and a registry id.
pub const REGISTRY_NAMESPACE: &str = "registry:";
