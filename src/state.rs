// src/state.rs

use crate::config::AppConfig;
use crate::error::Result;
use crate::service::RegistryService;
use tracing::info;

/// Shared state handed to every Axum handler.
pub struct AppState {
    pub config: AppConfig,
    pub service: RegistryService,
}

impl AppState {
    /// Builds the registry service for the configured store.
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Creating shared AppState: initializing registry service...");
        let service = RegistryService::from_config(&config)?;
        Ok(Self::with_service(config, service))
    }

    pub fn with_service(config: AppConfig, service: RegistryService) -> Self {
        Self { config, service }
    }
}
