//! Service identification endpoints

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Service info response
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub description: String,
}

/// Liveness response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// GET /
pub async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "AI-HAB Habitat Classification API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "This API provides endpoints for habitat classification using AI models."
            .to_string(),
    })
}

/// GET /status
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

/// Build info routes
pub fn info_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(info))
        .route("/status", get(status))
}
