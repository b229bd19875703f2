//! Health check endpoint
//!
//! Reports uptime and model readiness. The service is "degraded" while the
//! model is loading or after a failed load; predictions answer 503 then.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::inference::ModelState;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" when the model is ready, otherwise "degraded"
    pub status: String,
    /// Module name ("aihab-api")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    pub model: ModelState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    /// Last model load error if any (for diagnostics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_error: Option<String>,
    pub taxonomy_entries: usize,
    pub labels: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let model = state.predictor.model();
    let model_state = model.state();

    Json(HealthResponse {
        status: if model_state == ModelState::Ready {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        module: "aihab-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        model: model_state,
        model_version: model.version(),
        model_error: model.last_error(),
        taxonomy_entries: state.predictor.taxonomy().len(),
        labels: state.predictor.labels().len(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
