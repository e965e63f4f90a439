// src/handlers.rs

use crate::error::{AppError, Result};
use crate::registry::{ChangeSet, KeyRegistry, UnixMillis};
use crate::service::now_millis;
use crate::state::AppState;
use crate::storage::PurgeBatch;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Body of `POST /registries/:registry_id/changes`.
#[derive(Debug, Deserialize, Serialize)]
pub struct ApplyRequest {
    pub changes: ChangeSet,
    /// Evaluation instant; the server clock at arrival when omitted.
    #[serde(default)]
    pub now: Option<UnixMillis>,
}

/// Body of `POST /purge`.
#[derive(Debug, Deserialize, Serialize)]
pub struct PurgeRequest {
    pub prefix: String,
    #[serde(default)]
    pub cursor: u64,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn read_registry(
    State(state): State<Arc<AppState>>,
    Path(registry_id): Path<String>,
) -> Result<Json<KeyRegistry>> {
    match state.service.read(&registry_id).await? {
        Some(registry) => Ok(Json(registry)),
        None => Err(AppError::RegistryNotFound { registry_id }),
    }
}

pub async fn apply_changes(
    State(state): State<Arc<AppState>>,
    Path(registry_id): Path<String>,
    Json(request): Json<ApplyRequest>,
) -> Result<Json<KeyRegistry>> {
    let now = request.now.unwrap_or_else(now_millis);
    let registry = state
        .service
        .apply(&registry_id, &request.changes, now)
        .await?;
    Ok(Json(registry))
}

pub async fn purge_by_prefix(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PurgeRequest>,
) -> Result<Json<PurgeBatch>> {
    let batch_size = request
        .batch_size
        .unwrap_or(state.config.purge.batch_size);
    info!(
        prefix = %request.prefix,
        cursor = request.cursor,
        batch_size,
        "Purge requested"
    );
    let batch = state
        .service
        .purge_by_prefix(&request.prefix, request.cursor, batch_size)
        .await?;
    Ok(Json(batch))
}
