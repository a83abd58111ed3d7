//! Prometheus metrics for the prediction service.
//!
//! - Prediction request counts by outcome
//! - Rows scored
//! - Prediction latency
//! - Which model is being served
//!
//! # Example
//! ```no_run
//! use credit_risk_scorer::metrics::PREDICTION_REQUESTS_TOTAL;
//!
//! PREDICTION_REQUESTS_TOTAL.with_label_values(&["success"]).inc();
//! ```

use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{Counter, CounterVec, GaugeVec, Histogram, HistogramOpts, Opts, Registry};

const NAMESPACE: &str = "credit_risk_scorer";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Prediction requests handled
    ///
    /// Labels: outcome (success, client_error, server_error)
    pub static ref PREDICTION_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("prediction_requests_total", "Total number of prediction requests")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create PREDICTION_REQUESTS_TOTAL metric");

    /// Feature records scored
    pub static ref PREDICTED_ROWS_TOTAL: Counter = Counter::with_opts(
        Opts::new("predicted_rows_total", "Total number of feature records scored")
            .namespace(NAMESPACE)
    ).expect("Failed to create PREDICTED_ROWS_TOTAL metric");

    /// Time spent scaling and scoring one batch
    pub static ref PREDICTION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Prediction batch duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0])
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");

    /// Set to 1 for the model being served
    ///
    /// Labels: model_type, source
    pub static ref MODEL_INFO: GaugeVec = GaugeVec::new(
        Opts::new("model_info", "Model currently being served")
            .namespace(NAMESPACE),
        &["model_type", "source"]
    ).expect("Failed to create MODEL_INFO metric");
}

fn register<C: Collector + Clone + 'static>(collector: &C) -> Result<(), prometheus::Error> {
    match PROMETHEUS_REGISTRY.register(Box::new(collector.clone())) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    register(&*PREDICTION_REQUESTS_TOTAL)?;
    register(&*PREDICTED_ROWS_TOTAL)?;
    register(&*PREDICTION_DURATION_SECONDS)?;
    register(&*MODEL_INFO)?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Record one handled prediction request
pub fn record_prediction(outcome: &str, rows: usize, seconds: f64) {
    PREDICTION_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
    PREDICTED_ROWS_TOTAL.inc_by(rows as f64);
    PREDICTION_DURATION_SECONDS.observe(seconds);
}

/// Mark the model being served
pub fn set_model_info(model_type: &str, source: &str) {
    MODEL_INFO.reset();
    MODEL_INFO.with_label_values(&[model_type, source]).set(1.0);
}

/// Generate Prometheus text format metrics
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
