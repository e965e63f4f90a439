// src/config/validation.rs

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use tracing::{debug, warn};
use url::Url;

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> Result<()> {
        debug!("Starting configuration validation");

        if let Err(e) = Self::validate_registry_config(config) {
            warn!("Registry config validation failed: {}", e);
            return Err(e);
        }
        debug!("Registry config validation passed");

        if let Err(e) = Self::validate_redis_config(config) {
            warn!("Redis config validation failed: {}", e);
            return Err(e);
        }
        debug!("Redis config validation passed");

        if let Err(e) = Self::validate_server_config(config) {
            warn!("Server config validation failed: {}", e);
            return Err(e);
        }
        debug!("Server config validation passed");

        debug!("Configuration validation completed successfully");
        Ok(())
    }

    fn validate_registry_config(config: &AppConfig) -> Result<()> {
        let registry = &config.registry;

        if registry.window_secs == 0 {
            return Err(AppError::config_validation(
                "Window size cannot be 0",
                Some("registry.window_secs"),
            ));
        }

        if registry.ttl_secs == 0 {
            return Err(AppError::config_validation(
                "Registry ttl cannot be 0",
                Some("registry.ttl_secs"),
            ));
        }

        if registry.max_cas_retries == 0 {
            return Err(AppError::config_validation(
                "At least one write attempt is required",
                Some("registry.max_cas_retries"),
            ));
        }

        if config.purge.batch_size == 0 {
            return Err(AppError::config_validation(
                "Purge batch size cannot be 0",
                Some("purge.batch_size"),
            ));
        }

        if registry.ttl_secs < registry.window_secs {
            warn!(
                "Registry ttl ({}s) is shorter than the window ({}s); idle registries will expire before a window closes",
                registry.ttl_secs, registry.window_secs
            );
        }

        Ok(())
    }

    fn validate_redis_config(config: &AppConfig) -> Result<()> {
        let Some(redis_url) = &config.redis_url else {
            return Ok(());
        };

        let url = Url::parse(redis_url).map_err(|e| {
            AppError::config_validation(
                format!("Invalid URL in redis_url: {e}"),
                Some("redis_url"),
            )
        })?;

        match url.scheme() {
            "redis" | "rediss" => Ok(()),
            scheme => Err(AppError::config_validation(
                format!("Unsupported redis_url scheme '{scheme}'. Supported: redis, rediss"),
                Some("redis_url"),
            )),
        }
    }

    fn validate_server_config(config: &AppConfig) -> Result<()> {
        // Allow port 0 in test mode (system will assign a free port)
        if config.server.port == 0 && !config.server.test_mode {
            return Err(AppError::config_validation(
                "Server port cannot be 0 (except in test mode)",
                Some("server.port"),
            ));
        }

        if config.server.host.trim().is_empty() {
            return Err(AppError::config_validation(
                "Server host cannot be empty",
                Some("server.host"),
            ));
        }

        Ok(())
    }
}
