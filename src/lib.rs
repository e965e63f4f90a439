// src/lib.rs

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod registry;
pub mod service;
pub mod state;
pub mod storage;

use crate::handlers::{apply_changes, health_check, purge_by_prefix, read_registry};
use axum::{
    body::Body,
    http::{HeaderValue, Request as AxumRequest},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use registry::{ChangeSet, KeyRegistry, KeyState, RegistryPolicy};
pub use service::RegistryService;
pub use state::AppState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the router over the registry service.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/registries/:registry_id", get(read_registry))
        .route("/registries/:registry_id/changes", post(apply_changes))
        .route("/purge", post(purge_by_prefix))
        .with_state(state)
}

/// Assigns a request id and logs each request inside its own span.
async fn trace_requests(
    mut req: AxumRequest<Body>,
    next: axum::middleware::Next,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        http.method = %method,
        url.path = %path,
    );

    req.extensions_mut().insert(request_id);

    async move {
        let mut response = next.run(req).await;
        let elapsed = start_time.elapsed();

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert("X-Request-ID", value);
        }

        info!(
            http.response.duration = ?elapsed,
            http.status_code = response.status().as_u16(),
            "Finished processing request"
        );

        response
    }
    .instrument(span)
    .await
}

/// Loads configuration, builds the shared state and returns the full router.
pub fn run(config_path_override: Option<PathBuf>) -> Result<(Router, AppConfig)> {
    info!("Starting key registry service...");

    let (app_config, _config_path) = setup_configuration(config_path_override)?;
    let app_state = build_application_state(&app_config)?;

    Ok((build_app(app_state), app_config))
}

/// Router plus the request-level middleware stack.
pub fn build_app(state: Arc<AppState>) -> Router {
    create_router(state).layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(trace_requests))
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
    )
}

/// Resolves the config path, then loads, validates and logs the configuration.
pub fn setup_configuration(config_path_override: Option<PathBuf>) -> Result<(AppConfig, PathBuf)> {
    let config_path = config_path_override.unwrap_or_else(|| {
        std::env::var("KEY_REGISTRY_CONFIG")
            .map_or_else(|_| PathBuf::from("config.yaml"), PathBuf::from)
    });

    let config_path_display = config_path.display().to_string();
    if config_path.exists() {
        info!(config.path = %config_path_display, "Using configuration file");
    } else {
        info!(config.path = %config_path_display, "Optional configuration file not found. Using defaults and environment variables.");
    }

    let app_config = load(&config_path).map_err(|e| {
        error!(
            config.path = %config_path_display,
            error = ?e,
            "Failed to load or validate configuration. Exiting."
        );
        e
    })?;

    info!(
        registry.window_secs = app_config.registry.window_secs,
        registry.ttl_secs = app_config.registry.ttl_secs,
        registry.max_cas_retries = app_config.registry.max_cas_retries,
        store = if app_config.redis_url.is_some() { "redis" } else { "memory" },
        server.port = app_config.server.port,
        "Configuration loaded and validated successfully."
    );

    Ok((app_config, config_path))
}

fn load(config_path: &Path) -> Result<AppConfig> {
    config::load_config(config_path)
}

fn build_application_state(app_config: &AppConfig) -> Result<Arc<AppState>> {
    let app_state = AppState::new(app_config.clone()).map_err(|e| {
        error!(error = ?e, "Failed to initialize application state. Exiting.");
        e
    })?;

    info!("Application state initialized successfully.");
    Ok(Arc::new(app_state))
}
