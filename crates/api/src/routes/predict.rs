//! Prediction Route

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use inference_engine::{InferenceError, PredictionResponse};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::AppState;

/// Body of `POST /predict`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Per-cell voltages U1..UN
    pub voltages: Vec<f64>,
    /// Overrides the configured health threshold for this request
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// HTTP status for a failed prediction
fn error_status(err: &InferenceError) -> StatusCode {
    if err.is_invalid_input() {
        StatusCode::BAD_REQUEST
    } else if err.is_artifact_error() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Score one battery pack
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> (StatusCode, Json<PredictionResponse>) {
    let start = Instant::now();

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!("Rejected prediction body: {}", rejection.body_text());
            counter!("soh_predictions_total", "status" => "bad_request").increment(1);
            return (
                StatusCode::BAD_REQUEST,
                Json(PredictionResponse::Error {
                    error: rejection.body_text(),
                }),
            );
        }
    };

    let threshold = request
        .threshold
        .unwrap_or(state.engine.config().health_threshold);
    let result = state
        .engine
        .predict_with_threshold(&request.voltages, threshold);
    histogram!("soh_prediction_latency_seconds").record(start.elapsed().as_secs_f64());

    let status = match &result {
        Ok(prediction) => {
            counter!("soh_predictions_total", "status" => prediction.health_status.as_str())
                .increment(1);
            StatusCode::OK
        }
        Err(e) => {
            let status = error_status(e);
            warn!("Prediction failed ({}): {}", status, e);
            counter!("soh_predictions_total", "status" => "error").increment(1);
            status
        }
    };

    (status, Json(PredictionResponse::from(result)))
}
