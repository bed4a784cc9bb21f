use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use reelgate_core::SanitizedConfig;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Prometheus text-format metrics, with gauges refreshed from live state.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    crate::metrics::collect_dynamic_metrics(&state).await;
    let body = crate::metrics::encode_metrics();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
