// src/metrics.rs

//! Registry metrics on top of the `metrics` facade, exported in Prometheus
//! text format. Without the `metrics` feature every recorder is a no-op.

use axum::{http::StatusCode, response::IntoResponse};

pub use recorder::{
    install_recorder, record_apply, record_cas_conflict, record_change, record_purged, render,
};

pub async fn metrics_handler() -> impl IntoResponse {
    (StatusCode::OK, render())
}

#[cfg(feature = "metrics")]
mod recorder {
    use crate::error::{AppError, Result};
    use metrics::{counter, histogram};
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
    use once_cell::sync::OnceCell;
    use std::time::Duration;

    static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

    /// Installs the global Prometheus recorder. Safe to call more than once.
    pub fn install_recorder() -> Result<()> {
        PROMETHEUS
            .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
            .map(|_| ())
            .map_err(|e| AppError::internal(format!("Failed to install metrics recorder: {e}")))
    }

    /// Renders the current metrics; empty when no recorder was installed.
    pub fn render() -> String {
        PROMETHEUS
            .get()
            .map(PrometheusHandle::render)
            .unwrap_or_default()
    }

    pub fn record_apply(outcome: &'static str, elapsed: Duration) {
        counter!("key_registry_applies_total", "outcome" => outcome).increment(1);
        histogram!("key_registry_apply_duration_seconds").record(elapsed.as_secs_f64());
    }

    pub fn record_change(op: &'static str) {
        counter!("key_registry_changes_total", "op" => op).increment(1);
    }

    pub fn record_cas_conflict() {
        counter!("key_registry_cas_conflicts_total").increment(1);
    }

    pub fn record_purged(deleted: u64) {
        counter!("key_registry_purged_keys_total").increment(deleted);
    }
}

#[cfg(not(feature = "metrics"))]
mod recorder {
    use crate::error::Result;
    use std::time::Duration;

    pub fn install_recorder() -> Result<()> {
        Ok(())
    }

    pub fn render() -> String {
        String::new()
    }

    pub fn record_apply(_outcome: &'static str, _elapsed: Duration) {}

    pub fn record_change(_op: &'static str) {}

    pub fn record_cas_conflict() {}

    pub fn record_purged(_deleted: u64) {}
}
