use crate::error::{AppError, Result};
use crate::ml::boosting::GradientBoostingClassifier;
use crate::ml::models::{HyperParameters, ModelType};
use linfa::traits::Fit;
use linfa::Dataset;
use linfa_logistic::MultiLogisticRegression;
use ndarray::{Array1, Array2, Axis};
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};

/// Trait for classifiers
pub trait Classifier: Send + Sync {
    /// Fit on feature matrix `x` and class labels `y`
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()>;

    /// Class probabilities, one column per entry of [`classes`](Self::classes)
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Trained class labels in probability-column order
    fn classes(&self) -> &[usize];

    /// Get model type
    fn model_type(&self) -> ModelType;

    /// Check if model is trained
    fn is_trained(&self) -> bool;

    /// Predict class labels
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        let classes = self.classes();

        proba
            .rows()
            .into_iter()
            .map(|row| {
                let column = row
                    .argmax()
                    .map_err(|e| AppError::Prediction(format!("Invalid probabilities: {}", e)))?;
                Ok(classes[column])
            })
            .collect()
    }
}

/// Sorted distinct labels
pub fn unique_classes(y: &[usize]) -> Vec<usize> {
    let mut classes = y.to_vec();
    classes.sort_unstable();
    classes.dedup();
    classes
}

/// Row-wise softmax, shifted by the row max for stability
pub(crate) fn softmax_rows(mut logits: Array2<f64>) -> Array2<f64> {
    for mut row in logits.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    logits
}

pub(crate) fn check_fit_input(x: &Array2<f64>, y: &[usize]) -> Result<Vec<usize>> {
    if x.nrows() != y.len() {
        return Err(AppError::Training(format!(
            "Feature matrix has {} rows but {} labels were given",
            x.nrows(),
            y.len()
        )));
    }

    let classes = unique_classes(y);
    if classes.len() < 2 {
        return Err(AppError::Training(format!(
            "At least two classes are required for training, found {}",
            classes.len()
        )));
    }

    Ok(classes)
}

/// Multinomial logistic regression with L2 penalty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegressionClassifier {
    /// Inverse regularization strength
    c: f64,

    /// Solver iteration cap
    max_iterations: u64,

    /// Trained class labels
    classes: Vec<usize>,

    /// Model weights, n_features × n_classes
    weights: Option<Array2<f64>>,

    /// Per-class intercept
    intercept: Option<Array1<f64>>,
}

impl LogisticRegressionClassifier {
    pub fn new(c: f64, max_iterations: u64) -> Self {
        Self {
            c,
            max_iterations,
            classes: Vec::new(),
            weights: None,
            intercept: None,
        }
    }

    pub fn c(&self) -> f64 {
        self.c
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        let classes = check_fit_input(x, y)?;

        let dataset = Dataset::new(x.to_owned(), Array1::from(y.to_vec()));
        let fitted = MultiLogisticRegression::default()
            .alpha(1.0 / self.c)
            .max_iterations(self.max_iterations)
            .fit(&dataset)
            .map_err(|e| {
                AppError::Training(format!("Failed to train logistic regression: {}", e))
            })?;

        self.weights = Some(fitted.params().to_owned());
        self.intercept = Some(fitted.intercept().to_owned());
        self.classes = classes;

        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (weights, intercept) = match (&self.weights, &self.intercept) {
            (Some(w), Some(b)) => (w, b),
            _ => return Err(AppError::Prediction("Model not trained".to_string())),
        };

        if x.ncols() != weights.nrows() {
            return Err(AppError::Prediction(format!(
                "Model expects {} features, got {}",
                weights.nrows(),
                x.ncols()
            )));
        }

        let logits = x.dot(weights) + intercept;
        Ok(softmax_rows(logits))
    }

    fn classes(&self) -> &[usize] {
        &self.classes
    }

    fn model_type(&self) -> ModelType {
        ModelType::LogisticRegression
    }

    fn is_trained(&self) -> bool {
        self.weights.is_some()
    }
}

/// A fitted (or to-be-fitted) model of either supported family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    LogisticRegression(LogisticRegressionClassifier),
    GradientBoosting(GradientBoostingClassifier),
}

impl TrainedModel {
    fn inner(&self) -> &dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(model) => model,
            TrainedModel::GradientBoosting(model) => model,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TrainedModel::LogisticRegression(model) => model,
            TrainedModel::GradientBoosting(model) => model,
        }
    }
}

impl Classifier for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.inner().predict_proba(x)
    }

    fn classes(&self) -> &[usize] {
        self.inner().classes()
    }

    fn model_type(&self) -> ModelType {
        self.inner().model_type()
    }

    fn is_trained(&self) -> bool {
        self.inner().is_trained()
    }
}

impl HyperParameters {
    /// Untrained model for this configuration
    pub fn build(&self) -> TrainedModel {
        match *self {
            HyperParameters::LogisticRegression { c, max_iterations } => {
                TrainedModel::LogisticRegression(LogisticRegressionClassifier::new(
                    c,
                    max_iterations,
                ))
            }
            HyperParameters::GradientBoosting {
                n_estimators,
                learning_rate,
                max_depth,
            } => TrainedModel::GradientBoosting(GradientBoostingClassifier::new(
                n_estimators,
                learning_rate,
                max_depth,
            )),
        }
    }
}
