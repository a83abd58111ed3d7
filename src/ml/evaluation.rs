//! Classification metrics over held-out data.

use crate::error::Result;
use crate::ml::classifier::{unique_classes, Classifier};
use crate::ml::models::{ClassMetrics, ModelMetrics};
use ndarray::Array2;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// Reasons a metric is undefined for the given data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("No samples to score")]
    Empty,

    #[error("{0}")]
    ShapeMismatch(String),

    #[error("Class {0} has only one outcome in y_true; ROC AUC is undefined")]
    SingleClass(usize),
}

/// Fraction of exact matches
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }

    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Sorted union of the labels appearing in truth or prediction
pub fn observed_labels(y_true: &[usize], y_pred: &[usize]) -> Vec<usize> {
    let mut all = y_true.to_vec();
    all.extend_from_slice(y_pred);
    unique_classes(&all)
}

/// Confusion matrix with rows for truth and columns for prediction
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], labels: &[usize]) -> Array2<usize> {
    let mut matrix = Array2::zeros((labels.len(), labels.len()));

    for (t, p) in y_true.iter().zip(y_pred) {
        if let (Ok(i), Ok(j)) = (labels.binary_search(t), labels.binary_search(p)) {
            matrix[[i, j]] += 1;
        }
    }

    matrix
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Precision, recall, F1 and support for every label
pub fn per_class_metrics(y_true: &[usize], y_pred: &[usize], labels: &[usize]) -> Vec<ClassMetrics> {
    let matrix = confusion_matrix(y_true, y_pred, labels);

    (0..labels.len())
        .map(|k| {
            let tp = matrix[[k, k]];
            let predicted = matrix.column(k).sum();
            let support = matrix.row(k).sum();

            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1_score = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            ClassMetrics {
                precision,
                recall,
                f1_score,
                support,
            }
        })
        .collect()
}

/// Support-weighted (precision, recall, f1)
pub fn weighted_scores(y_true: &[usize], y_pred: &[usize]) -> (f64, f64, f64) {
    let labels = observed_labels(y_true, y_pred);
    let per_class = per_class_metrics(y_true, y_pred, &labels);
    let total: usize = per_class.iter().map(|m| m.support).sum();

    if total == 0 {
        return (0.0, 0.0, 0.0);
    }

    per_class.iter().fold((0.0, 0.0, 0.0), |(p, r, f), m| {
        let weight = m.support as f64 / total as f64;
        (
            p + weight * m.precision,
            r + weight * m.recall,
            f + weight * m.f1_score,
        )
    })
}

/// Support-weighted F1, the model selection score
pub fn f1_weighted(y_true: &[usize], y_pred: &[usize]) -> f64 {
    weighted_scores(y_true, y_pred).2
}

/// Average ranks (1-based), ties sharing the mean of their positions
fn average_ranks(scores: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }

        let rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = rank;
        }
        start = end;
    }

    ranks
}

/// Binary ROC AUC via the Mann-Whitney statistic
fn binary_auc(positive: &[bool], scores: &[f64], class: usize) -> std::result::Result<f64, MetricError> {
    let n_pos = positive.iter().filter(|p| **p).count();
    let n_neg = positive.len() - n_pos;

    if n_pos == 0 || n_neg == 0 {
        return Err(MetricError::SingleClass(class));
    }

    let ranks = average_ranks(scores);
    let rank_sum: f64 = ranks
        .iter()
        .zip(positive)
        .filter(|(_, p)| **p)
        .map(|(r, _)| r)
        .sum();

    let n_pos = n_pos as f64;
    Ok((rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64))
}

/// One-vs-rest ROC AUC averaged with class-prevalence weights.
///
/// `proba` columns are ordered by `classes`. Every class the model knows must
/// appear in `y_true`, otherwise the score is undefined.
pub fn roc_auc_ovr_weighted(
    y_true: &[usize],
    proba: &Array2<f64>,
    classes: &[usize],
) -> std::result::Result<f64, MetricError> {
    if y_true.is_empty() {
        return Err(MetricError::Empty);
    }

    if proba.nrows() != y_true.len() || proba.ncols() != classes.len() {
        return Err(MetricError::ShapeMismatch(format!(
            "Probability matrix is {}x{}, expected {}x{}",
            proba.nrows(),
            proba.ncols(),
            y_true.len(),
            classes.len()
        )));
    }

    let present = unique_classes(y_true);
    if present != classes {
        return Err(MetricError::ShapeMismatch(format!(
            "Number of classes in y_true ({}) not equal to the number of columns in y_score ({})",
            present.len(),
            classes.len()
        )));
    }

    let mut weighted_sum = 0.0;
    for (k, &class) in classes.iter().enumerate() {
        let positive: Vec<bool> = y_true.iter().map(|&y| y == class).collect();
        let scores = proba.column(k).to_vec();
        let auc = binary_auc(&positive, &scores, class)?;

        let prevalence = positive.iter().filter(|p| **p).count() as f64 / y_true.len() as f64;
        weighted_sum += prevalence * auc;
    }

    Ok(weighted_sum)
}

/// Score a fitted classifier on held-out data.
///
/// An undefined ROC AUC is recorded as `None` and does not fail evaluation.
pub fn evaluate(model: &dyn Classifier, x: &Array2<f64>, y_true: &[usize]) -> Result<ModelMetrics> {
    let proba = model.predict_proba(x)?;
    let y_pred = model.predict(x)?;

    let labels = observed_labels(y_true, &y_pred);
    let (precision, recall, f1_score) = weighted_scores(y_true, &y_pred);

    let roc_auc = match roc_auc_ovr_weighted(y_true, &proba, model.classes()) {
        Ok(auc) => Some(auc),
        Err(e) => {
            warn!(
                model_type = %model.model_type(),
                error = %e,
                "ROC AUC could not be computed, recording it as undefined"
            );
            None
        }
    };

    let per_class_metrics: HashMap<String, ClassMetrics> = labels
        .iter()
        .zip(per_class_metrics(y_true, &y_pred, &labels))
        .map(|(label, metrics)| (label.to_string(), metrics))
        .collect();

    Ok(ModelMetrics {
        accuracy: accuracy(y_true, &y_pred),
        precision,
        recall,
        f1_score,
        roc_auc,
        confusion_matrix: Some(confusion_matrix(y_true, &y_pred, &labels)),
        labels,
        per_class_metrics,
    })
}
