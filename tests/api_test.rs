//! HTTP API tests against an in-process router

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{cycling_labels, sample_record, synthetic_features, trained_artifacts};
use credit_risk_scorer::{
    api::{build_router, AppState},
    ml::{PredictionService, StandardScaler},
    models::feature_names,
    tracking::ModelSource,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> Router {
    let (artifact, scaler) = trained_artifacts();
    let service = PredictionService::new(
        artifact,
        Some(scaler),
        ModelSource::File {
            path: PathBuf::from("models/best_model.bin"),
        },
    )
    .unwrap();

    build_router(AppState::new(Arc::new(service)))
}

fn json_request(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn assert_probabilities(prediction: &Value) {
    let object = prediction.as_object().unwrap();
    assert_eq!(object.len(), 3);

    let mut total = 0.0;
    for level in ["Low", "Medium", "High"] {
        let p = object[level].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&p));
        total += p;
    }
    assert!((total - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_single_record() {
    let body = json!([sample_record()]).to_string();
    let (status, json) = send(test_app(), json_request("/predict/", body)).await;

    assert_eq!(status, StatusCode::OK);
    let predictions = json.as_array().unwrap();
    assert_eq!(predictions.len(), 1);
    assert_probabilities(&predictions[0]);
}

#[tokio::test]
async fn test_predictions_follow_input_order() {
    let low = sample_record();
    let mut high = sample_record();
    high.log_monetary = 100.0;
    high.frequency = 100.0;

    let app = test_app();
    let (_, batch) = send(
        app.clone(),
        json_request("/predict/", json!([low, high, low]).to_string()),
    )
    .await;
    let (_, first) = send(app.clone(), json_request("/predict/", json!([low]).to_string())).await;
    let (_, second) = send(app, json_request("/predict/", json!([high]).to_string())).await;

    let batch = batch.as_array().unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch[0], first[0]);
    assert_eq!(batch[1], second[0]);
    assert_eq!(batch[2], first[0]);
}

#[tokio::test]
async fn test_route_without_trailing_slash() {
    let body = json!([sample_record()]).to_string();
    let (status, json) = send(test_app(), json_request("/predict", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_batch() {
    let (status, json) = send(test_app(), json_request("/predict/", "[]".to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));
}

#[tokio::test]
async fn test_missing_field_is_unprocessable() {
    let body = r#"[{"LogMonetary": 10.5, "Frequency": 12, "LogAvgTransactionAmount": 7.2,
                    "NightRatio": 0.1, "Freq_FinancialServices": 4}]"#;
    let (status, json) = send(test_app(), json_request("/predict/", body.to_string())).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["detail"].as_str().unwrap().contains("Freq_Airtime"));
}

#[tokio::test]
async fn test_non_numeric_field_is_unprocessable() {
    let body = r#"[{"LogMonetary": "lots", "Frequency": 12, "LogAvgTransactionAmount": 7.2,
                    "NightRatio": 0.1, "Freq_FinancialServices": 4, "Freq_Airtime": 6}]"#;
    let (status, json) = send(test_app(), json_request("/predict/", body.to_string())).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["detail"].is_string());
}

#[tokio::test]
async fn test_object_instead_of_array_is_unprocessable() {
    let body = json!(sample_record()).to_string();
    let (status, _) = send(test_app(), json_request("/predict/", body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (status, json) = send(
        test_app(),
        json_request("/predict/", r#"[{"LogMonetary": 10.5,"#.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["detail"].is_string());
}

#[tokio::test]
async fn test_missing_content_type_is_unsupported() {
    let request = Request::builder()
        .method("POST")
        .uri("/predict/")
        .body(Body::from(json!([sample_record()]).to_string()))
        .unwrap();
    let (status, _) = send(test_app(), request).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_overflowing_values_are_server_error() {
    // Features spread well under 1 so scaling 1e308 overflows
    let (artifact, _) = trained_artifacts();
    let narrow = synthetic_features(&cycling_labels(30), 11) * 0.01;
    let scaler = StandardScaler::fit(&narrow, feature_names()).unwrap();
    let service = PredictionService::new(
        artifact,
        Some(scaler),
        ModelSource::File {
            path: PathBuf::from("model.bin"),
        },
    )
    .unwrap();
    let app = build_router(AppState::new(Arc::new(service)));

    let body = r#"[{"LogMonetary": 1e308, "Frequency": 1e308, "LogAvgTransactionAmount": 1e308,
                    "NightRatio": 1e308, "Freq_FinancialServices": 1e308, "Freq_Airtime": 1e308}]"#;
    let (status, json) = send(app, json_request("/predict/", body.to_string())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["detail"].as_str().unwrap().contains("non-finite"));
}

#[tokio::test]
async fn test_health() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(test_app(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["model_type"], "GradientBoosting");
    assert_eq!(json["model_source"], "file:models/best_model.bin");
    assert_eq!(json["scaler_loaded"], true);
}

#[tokio::test]
async fn test_metrics_disabled_by_default() {
    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_exposed_when_enabled() {
    credit_risk_scorer::metrics::init_metrics().unwrap();

    let (artifact, scaler) = trained_artifacts();
    let service = PredictionService::new(
        artifact,
        Some(scaler),
        ModelSource::File {
            path: PathBuf::from("model.bin"),
        },
    )
    .unwrap();
    let app = build_router(AppState::new(Arc::new(service)).with_metrics(true));

    let body = json!([sample_record()]).to_string();
    let (status, _) = send(app.clone(), json_request("/predict/", body)).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("credit_risk_scorer_prediction_requests_total"));
}
