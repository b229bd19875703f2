//! Prediction endpoint
//!
//! `POST /predict` takes the photograph as multipart field `file` and the
//! prediction options as query parameters. Decoding and inference are CPU
//! bound and run on the blocking pool.

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::QueryRejection,
        Multipart, Query, State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::types::{PredictParams, PredictionResponse};
use crate::AppState;

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

/// POST /predict
pub async fn predict(
    State(state): State<AppState>,
    params: Result<Query<PredictParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<PredictionResponse>> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let request_id = Uuid::new_v4();
    let span = info_span!("predict", %request_id);

    async move {
        let image = read_image_field(multipart).await?;
        debug!(bytes = image.len(), "Received image upload");

        let predictor = state.predictor.clone();
        let blocking_span = tracing::Span::current();
        let response = tokio::task::spawn_blocking(move || {
            blocking_span.in_scope(|| predictor.predict(&image, params))
        })
        .await
        .map_err(|e| ApiError::Internal(format!("prediction task failed: {}", e)))??;

        Ok(Json(response))
    }
    .instrument(span)
    .await
}

/// Pull the `file` field out of the form, ignoring any other fields
async fn read_image_field(mut multipart: Multipart) -> ApiResult<Bytes> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error("Malformed multipart body", e))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| upload_error("Failed to read upload", e))?;
        if data.is_empty() {
            return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
        }
        return Ok(data);
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        FILE_FIELD
    )))
}

fn upload_error(context: &str, err: MultipartError) -> ApiError {
    let message = format!("{}: {}", context, err.body_text());
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(message)
    } else {
        ApiError::BadRequest(message)
    }
}

/// Build prediction routes
pub fn predict_routes() -> Router<AppState> {
    Router::new().route("/predict", post(predict))
}
