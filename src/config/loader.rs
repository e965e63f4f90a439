// src/config/loader.rs

use crate::config::{AppConfig, ConfigValidator};
use crate::error::{AppError, Result};
use std::path::Path;
use tracing::{debug, info, warn};

/// Load configuration from file (optional) and environment variables
pub fn load_config(config_path: &Path) -> Result<AppConfig> {
    let mut config = if config_path.exists() {
        info!("Loading configuration from file: {}", config_path.display());
        load_from_file(config_path)?
    } else {
        info!("Configuration file not found, using defaults");
        AppConfig::default()
    };

    // Override with environment variables
    override_with_env(&mut config);

    // Validate the final configuration
    ConfigValidator::validate(&config)?;

    debug!("Configuration loaded and validated successfully");
    Ok(config)
}

fn load_from_file(config_path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(config_path).map_err(|_| AppError::ConfigNotFound {
        path: config_path.display().to_string(),
    })?;

    if content.trim().is_empty() {
        warn!("Config file '{}' is empty. Using defaults.", config_path.display());
        return Ok(AppConfig::default());
    }

    serde_yaml::from_str(&content).map_err(|e| AppError::ConfigParse {
        message: format!("Failed to parse config file: {e}"),
        line: e.location().map(|loc| loc.line()),
    })
}

fn override_with_env(config: &mut AppConfig) {
    // Override Redis URL from environment
    if let Ok(redis_url) = std::env::var("REDIS_URL") {
        info!("Overriding Redis URL from environment variable");
        config.redis_url = Some(redis_url);
    }

    // Override server port from environment
    if let Some(port) = parse_env::<u16>("PORT") {
        info!("Overriding server port from environment variable: {}", port);
        config.server.port = port;
    }

    if let Some(window_secs) = parse_env::<u64>("KEY_REGISTRY_WINDOW_SECS") {
        info!("Overriding window size from environment: {}s", window_secs);
        config.registry.window_secs = window_secs;
    }

    if let Some(ttl_secs) = parse_env::<u64>("KEY_REGISTRY_TTL_SECS") {
        info!("Overriding registry ttl from environment: {}s", ttl_secs);
        config.registry.ttl_secs = ttl_secs;
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Invalid {} environment variable: {}", name, raw);
            None
        }
    }
}
