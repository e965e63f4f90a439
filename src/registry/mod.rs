// src/registry/mod.rs

//! Key health registry: data model and the pure apply transition.

pub mod changes;
pub mod codec;
pub mod key_registry;
pub mod key_state;
pub mod transition;
pub mod window;

pub use changes::{Change, ChangeSet, KeyUpdate, NewKey};
pub use key_registry::KeyRegistry;
pub use key_state::{BreakerLevel, KeyId, KeyState, SecretRef};
pub use transition::{apply_changes, RegistryPolicy};
pub use window::{UnixMillis, WindowBounds, WindowStats};
