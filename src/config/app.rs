// src/config/app.rs

use crate::error::Result;
use crate::registry::RegistryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub test_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            test_mode: false,
        }
    }
}

/// Window, TTL and write-retry settings shared by every registry.
#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct RegistryConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_cas_retries")]
    pub max_cas_retries: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            ttl_secs: default_ttl_secs(),
            max_cas_retries: default_max_cas_retries(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct PurgeConfig {
    #[serde(default = "default_purge_batch_size")]
    pub batch_size: usize,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            batch_size: default_purge_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Without a Redis URL registries live in process memory.
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default)]
    pub redis_key_prefix: Option<String>,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub purge: PurgeConfig,
}

impl AppConfig {
    /// Window and TTL as used by the registry transition.
    pub fn registry_policy(&self) -> Result<RegistryPolicy> {
        RegistryPolicy::new(
            Duration::from_secs(self.registry.window_secs),
            Duration::from_secs(self.registry.ttl_secs),
        )
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_window_secs() -> u64 {
    60
}

fn default_ttl_secs() -> u64 {
    86_400
}

fn default_max_cas_retries() -> u32 {
    16
}

fn default_purge_batch_size() -> usize {
    500
}
