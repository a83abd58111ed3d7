//! Machine learning for credit risk scoring
//!
//! This module provides:
//! - Feature standardization
//! - Logistic regression and gradient boosting classifiers
//! - Grid search with stratified cross-validation
//! - Held-out evaluation metrics
//! - Model artifact persistence and the prediction service

pub mod artifact;
pub mod boosting;
pub mod classifier;
pub mod evaluation;
pub mod models;
pub mod scaler;
pub mod search;
pub mod service;

pub use artifact::{load_artifact, save_artifact, ModelArtifact};
pub use boosting::GradientBoostingClassifier;
pub use classifier::{Classifier, LogisticRegressionClassifier, TrainedModel};
pub use evaluation::{evaluate, roc_auc_ovr_weighted, MetricError};
pub use models::{ClassMetrics, HyperParameters, ModelMetadata, ModelMetrics, ModelType};
pub use scaler::StandardScaler;
pub use search::{boosting_grid, logistic_grid, GridSearch, GridSearchResult};
pub use service::PredictionService;
