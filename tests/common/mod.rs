//! Common test utilities and fixtures

#![allow(dead_code)]

use key_registry::{
    config::AppConfig,
    registry::{KeyId, NewKey, RegistryPolicy, SecretRef},
    AppState, RegistryService,
};
use std::sync::Arc;

pub const SEC: u64 = 1_000;
pub const WINDOW_MS: u64 = 60 * SEC;
pub const TTL_MS: u64 = 86_400 * SEC;

/// 60 s windows and a one-day TTL, matching the config defaults.
pub fn test_policy() -> RegistryPolicy {
    RegistryPolicy::from_millis(WINDOW_MS, TTL_MS).unwrap()
}

pub fn new_key(id: &str) -> NewKey {
    NewKey::new(id, SecretRef::new(format!("enc:{id}")))
}

pub fn key_id(id: &str) -> KeyId {
    KeyId::new(id)
}

/// Test configuration builder
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.server.test_mode = true;
        Self { config }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_window_secs(mut self, window_secs: u64) -> Self {
        self.config.registry.window_secs = window_secs;
        self
    }

    pub fn with_purge_batch_size(mut self, batch_size: usize) -> Self {
        self.config.purge.batch_size = batch_size;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn memory_service() -> RegistryService {
    RegistryService::in_memory(test_policy())
}

/// Shared state over an in-memory store.
pub fn test_state(config: AppConfig) -> Arc<AppState> {
    Arc::new(AppState::new(config).unwrap())
}
