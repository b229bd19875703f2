//! aihab-api library - Habitat classification service
//!
//! Classifies a habitat photograph into UK Habitat Classification codes and
//! returns each candidate with its full ancestor chain.

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Router};
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod inference;
pub mod labels;
pub mod predict;
pub mod types;
pub mod visualization;

pub use error::{ApiError, ApiResult};
pub use predict::{PredictError, Predictor, PredictorSettings};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Prediction pipeline (taxonomy, labels, model)
    pub predictor: Arc<Predictor>,
    /// Service startup time, for uptime reporting
    pub startup_time: DateTime<Utc>,
    /// Largest accepted request body
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Create new application state
    pub fn new(predictor: Arc<Predictor>, max_upload_bytes: usize) -> Self {
        Self {
            predictor,
            startup_time: Utc::now(),
            max_upload_bytes,
        }
    }
}

/// Build application router
///
/// All routes are public; `/health` reports model readiness.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .merge(api::info_routes())
        .merge(api::health_routes())
        .merge(api::predict_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
