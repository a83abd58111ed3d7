use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{CustomerFeatures, RiskPrediction};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info, warn};

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let metadata = state.service.model_metadata();

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_type: metadata.model_type.candidate_name().to_string(),
        model_source: state.service.source().to_string(),
        scaler_loaded: state.service.has_scaler(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_type: String,
    pub model_source: String,
    pub scaler_loaded: bool,
}

/// Score a batch of customers.
///
/// Responds with one `{Low, Medium, High}` object per record, in input order.
pub async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Vec<CustomerFeatures>>, JsonRejection>,
) -> Result<Json<Vec<RiskPrediction>>> {
    let started = Instant::now();

    let Json(records) = payload.map_err(|rejection| {
        let err = AppError::from(rejection);
        warn!(status_code = err.status_code().as_u16(), error = %err, "Rejected prediction request");
        metrics::record_prediction("client_error", 0, started.elapsed().as_secs_f64());
        err
    })?;

    match state.service.predict(&records) {
        Ok(predictions) => {
            info!(batch_size = records.len(), "Prediction successful");
            metrics::record_prediction("success", records.len(), started.elapsed().as_secs_f64());
            Ok(Json(predictions))
        }
        Err(e) => {
            error!(batch_size = records.len(), error = %e, "Prediction request failed");
            metrics::record_prediction("server_error", 0, started.elapsed().as_secs_f64());
            Err(e)
        }
    }
}

/// Prometheus text exposition
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    if !state.metrics_enabled {
        return (
            axum::http::StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "metrics disabled\n".to_string(),
        );
    }

    (
        axum::http::StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}
