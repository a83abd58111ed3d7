use crate::models::RiskLevel;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Model family
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Multinomial logistic regression
    LogisticRegression,

    /// Softmax gradient-boosted regression trees
    GradientBoosting,
}

impl ModelType {
    /// Key used for experiment-tracker metric and model names
    pub fn candidate_name(&self) -> &'static str {
        match self {
            ModelType::LogisticRegression => "LogisticRegression",
            ModelType::GradientBoosting => "GradientBoosting",
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::LogisticRegression => write!(f, "Logistic Regression"),
            ModelType::GradientBoosting => write!(f, "Gradient Boosting"),
        }
    }
}

/// One point of a hyperparameter grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HyperParameters {
    LogisticRegression {
        /// Inverse regularization strength
        c: f64,
        max_iterations: u64,
    },
    GradientBoosting {
        n_estimators: usize,
        learning_rate: f64,
        max_depth: usize,
    },
}

impl HyperParameters {
    pub fn model_type(&self) -> ModelType {
        match self {
            HyperParameters::LogisticRegression { .. } => ModelType::LogisticRegression,
            HyperParameters::GradientBoosting { .. } => ModelType::GradientBoosting,
        }
    }

    /// Flattened `name -> value` view for tracking and metadata
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let pairs: Vec<(&str, String)> = match self {
            HyperParameters::LogisticRegression { c, max_iterations } => vec![
                ("C", c.to_string()),
                ("max_iter", max_iterations.to_string()),
            ],
            HyperParameters::GradientBoosting {
                n_estimators,
                learning_rate,
                max_depth,
            } => vec![
                ("n_estimators", n_estimators.to_string()),
                ("learning_rate", learning_rate.to_string()),
                ("max_depth", max_depth.to_string()),
            ],
        };

        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

impl std::fmt::Display for HyperParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .to_map()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{}({})", self.model_type().candidate_name(), rendered.join(", "))
    }
}

/// Model evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Support-weighted precision
    pub precision: f64,

    /// Support-weighted recall
    pub recall: f64,

    /// Support-weighted F1 score
    pub f1_score: f64,

    /// One-vs-rest, support-weighted ROC-AUC; `None` when undefined
    pub roc_auc: Option<f64>,

    /// Confusion matrix (rows: truth, columns: prediction), ordered by `labels`
    pub confusion_matrix: Option<Array2<usize>>,

    /// Labels indexing the confusion matrix
    pub labels: Vec<usize>,

    /// Per-class metrics
    pub per_class_metrics: HashMap<String, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            roc_auc: None,
            confusion_matrix: None,
            labels: Vec::new(),
            per_class_metrics: HashMap::new(),
        }
    }

    /// ROC-AUC with NaN standing in for "undefined"
    pub fn roc_auc_or_nan(&self) -> f64 {
        self.roc_auc.unwrap_or(f64::NAN)
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Model metadata persisted alongside the fitted parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Candidate name the model was selected under
    pub name: String,

    /// Crate version that produced the artifact
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Feature names in fit order
    pub feature_names: Vec<String>,

    /// Trained class labels, in probability-column order
    pub classes: Vec<usize>,

    /// Risk level of each entry in `classes`
    pub risk_levels: Vec<RiskLevel>,

    /// Hyperparameters of the fitted model
    pub hyperparameters: HyperParameters,

    /// Mean cross-validated weighted F1 of the chosen configuration
    pub cv_score: Option<f64>,

    /// Held-out evaluation metrics
    pub validation_metrics: Option<ModelMetrics>,
}
