//! Error types for aihab-api
//!
//! Maps prediction failures onto HTTP statuses so callers can tell a bad
//! request (400) from a model that is still loading (503, retry) from broken
//! taxonomy data on our side (500).

use crate::predict::PredictError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Seconds a client should wait before retrying a not-ready model
const RETRY_AFTER_SECS: &str = "5";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload exceeds the configured body limit (413)
    #[error("Upload too large: {0}")]
    PayloadTooLarge(String),

    /// Prediction pipeline error (status depends on the fault)
    #[error(transparent)]
    Predict(#[from] PredictError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Predict(err) => match err {
                PredictError::InvalidScheme(_) => (StatusCode::BAD_REQUEST, "INVALID_SCHEME"),
                PredictError::UnsupportedScheme(_) => {
                    (StatusCode::BAD_REQUEST, "UNSUPPORTED_SCHEME")
                }
                PredictError::InvalidTopN { .. }
                | PredictError::InvalidLevel { .. }
                | PredictError::InvalidParameter { .. } => {
                    (StatusCode::BAD_REQUEST, "INVALID_PARAMETER")
                }
                PredictError::ImageDecode(_) => (StatusCode::BAD_REQUEST, "INVALID_IMAGE"),
                PredictError::ModelNotReady => {
                    (StatusCode::SERVICE_UNAVAILABLE, "MODEL_NOT_READY")
                }
                PredictError::Inference(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INFERENCE_ERROR")
                }
                PredictError::Taxonomy(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "TAXONOMY_INTEGRITY")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        let retriable = matches!(&self, ApiError::Predict(e) if e.is_retriable());

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        let mut response = (status, body).into_response();
        if retriable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use aihab_common::TaxonomyError;

    #[test]
    fn test_input_faults_are_bad_request() {
        let err = ApiError::from(PredictError::UnsupportedScheme("eunis".to_string()));
        assert_eq!(err.status_and_code(), (StatusCode::BAD_REQUEST, "UNSUPPORTED_SCHEME"));

        let err = ApiError::from(PredictError::InvalidScheme("x".to_string()));
        assert_eq!(err.status_and_code(), (StatusCode::BAD_REQUEST, "INVALID_SCHEME"));
    }

    #[test]
    fn test_not_ready_sets_retry_after() {
        let response = ApiError::from(PredictError::ModelNotReady).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], RETRY_AFTER_SECS);
    }

    #[test]
    fn test_taxonomy_fault_is_server_error() {
        let err = ApiError::from(PredictError::Taxonomy(TaxonomyError::UnknownCode(
            "g1".to_string(),
        )));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
