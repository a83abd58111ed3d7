use anyhow::Context;
use credit_risk_scorer::{
    api::{build_router, AppState},
    config::Config,
    logging::init_tracing,
    metrics,
    ml::PredictionService,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize tracing
    init_tracing(&config.observability);

    tracing::info!("Starting Credit Risk Scorer v{}", env!("CARGO_PKG_VERSION"));

    // Load model and scaler; the service does not start without a model
    let service = PredictionService::initialize(&config)
        .await
        .context("Prediction service is unavailable")?;
    let metadata = service.model_metadata();
    tracing::info!(
        "✅ Model loaded: {} ({}) from {}",
        metadata.name,
        metadata.hyperparameters,
        service.source()
    );

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            metrics::set_model_info(metadata.model_type.candidate_name(), service.source().kind());
            tracing::info!("✅ Prometheus metrics initialized");
        }
    } else {
        tracing::info!("⚠️  Prometheus metrics disabled in configuration");
    }

    let app_state = AppState::new(Arc::new(service))
        .with_metrics(config.observability.prometheus_enabled);
    let app = build_router(app_state);

    // Start HTTP server
    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", http_addr))?;

    tracing::info!("🚀 HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Predictions: POST http://{}/predict/", http_addr);

    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("HTTP server error")?;

    tracing::info!("Shutting down gracefully...");
    Ok(())
}
