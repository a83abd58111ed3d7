use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::{Validate, ValidationError};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Local artifact locations
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Model registry configuration
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Experiment tracking configuration
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Training pipeline configuration
    #[serde(default)]
    pub training: TrainingConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/local.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration layering the embedded defaults, `path` (if it
    /// exists) and `CREDIT_RISK__*` environment variables.
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("CREDIT_RISK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Serialized classifier written by training and read at startup
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Serialized scaler written by training and read at startup
    #[serde(default = "default_scaler_path")]
    pub scaler_path: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            scaler_path: default_scaler_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Consult the registry before the local model file
    #[serde(default)]
    pub enabled: bool,

    /// Registry backend
    #[serde(default)]
    pub backend: RegistryBackend,

    /// Root directory for the file backend
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,

    /// Base URL for the HTTP backend
    pub url: Option<String>,

    /// Registered model name
    #[serde(default = "default_registry_model_name")]
    pub model_name: String,

    /// Registered model stage
    #[serde(default = "default_registry_stage")]
    pub stage: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: RegistryBackend::default(),
            path: default_registry_path(),
            url: None,
            model_name: default_registry_model_name(),
            stage: default_registry_stage(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RegistryBackend {
    #[default]
    File,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Record training runs
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Root directory for run records
    #[serde(default = "default_tracking_dir")]
    pub dir: PathBuf,

    /// Experiment name (subdirectory of `dir`)
    #[serde(default = "default_experiment")]
    pub experiment: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_tracking_dir(),
            experiment: default_experiment(),
        }
    }
}

/// Training pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrainingConfig {
    /// Name of the ground-truth column in the dataset
    #[serde(default = "default_label_column")]
    #[validate(length(min = 1))]
    pub label_column: String,

    /// Fraction of rows held out for evaluation
    #[serde(default = "default_test_size")]
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub test_size: f64,

    /// Seed for the train/test shuffle
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of cross-validation folds
    #[serde(default = "default_cv_folds")]
    #[validate(range(min = 2))]
    pub cv_folds: usize,

    /// Inverse regularization strengths searched for logistic regression
    #[serde(default = "default_logistic_c")]
    #[validate(length(min = 1), custom(function = "validate_positive"))]
    pub logistic_c: Vec<f64>,

    /// Iteration cap for logistic regression
    #[serde(default = "default_logistic_max_iter")]
    #[validate(range(min = 1))]
    pub logistic_max_iter: u64,

    /// Ensemble sizes searched for gradient boosting
    #[serde(default = "default_gb_n_estimators")]
    #[validate(length(min = 1))]
    pub gb_n_estimators: Vec<usize>,

    /// Learning rates searched for gradient boosting
    #[serde(default = "default_gb_learning_rate")]
    #[validate(length(min = 1), custom(function = "validate_positive"))]
    pub gb_learning_rate: Vec<f64>,

    /// Depth of each boosted regression tree
    #[serde(default = "default_gb_max_depth")]
    #[validate(range(min = 1))]
    pub gb_max_depth: usize,

    /// Register the selected model in the configured registry
    #[serde(default)]
    pub register_model: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            label_column: default_label_column(),
            test_size: default_test_size(),
            seed: default_seed(),
            cv_folds: default_cv_folds(),
            logistic_c: default_logistic_c(),
            logistic_max_iter: default_logistic_max_iter(),
            gb_n_estimators: default_gb_n_estimators(),
            gb_learning_rate: default_gb_learning_rate(),
            gb_max_depth: default_gb_max_depth(),
            register_model: false,
        }
    }
}

fn validate_positive(values: &[f64]) -> Result<(), ValidationError> {
    if values.iter().all(|v| v.is_finite() && *v > 0.0) {
        Ok(())
    } else {
        Err(ValidationError::new("must_be_positive"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/best_model.bin")
}

fn default_scaler_path() -> PathBuf {
    PathBuf::from("models/scaler.bin")
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("mlruns/registry")
}

fn default_registry_model_name() -> String {
    "best_model".to_string()
}

fn default_registry_stage() -> String {
    "Production".to_string()
}

fn default_tracking_dir() -> PathBuf {
    PathBuf::from("mlruns")
}

fn default_experiment() -> String {
    "credit-risk".to_string()
}

fn default_label_column() -> String {
    "RiskCluster".to_string()
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_cv_folds() -> usize {
    3
}

fn default_logistic_c() -> Vec<f64> {
    vec![0.1, 1.0, 10.0]
}

fn default_logistic_max_iter() -> u64 {
    2000
}

fn default_gb_n_estimators() -> Vec<usize> {
    vec![50, 100]
}

fn default_gb_learning_rate() -> Vec<f64> {
    vec![0.05, 0.1]
}

fn default_gb_max_depth() -> usize {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "credit-risk-scorer".to_string()
}

fn default_true() -> bool {
    true
}
