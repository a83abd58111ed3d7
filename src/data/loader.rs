use crate::error::{AppError, Result};
use crate::ml::classifier::unique_classes;
use crate::models::{FEATURE_NAMES, N_FEATURES};
use ndarray::{Array2, Axis};
use std::path::Path;
use tracing::info;

/// Feature matrix and integer labels read from a training table
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    /// One row per sample, columns in `FEATURE_NAMES` order
    pub features: Array2<f64>,
    pub labels: Vec<usize>,
}

impl LabeledDataset {
    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    /// Sorted distinct labels
    pub fn classes(&self) -> Vec<usize> {
        unique_classes(&self.labels)
    }

    /// Subset of rows, in the given order
    pub fn select(&self, indices: &[usize]) -> LabeledDataset {
        LabeledDataset {
            features: self.features.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

fn column_index(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
        AppError::Dataset(format!("{} has no column '{}'", path.display(), name))
    })
}

fn parse_label(cell: &str) -> Option<usize> {
    let cell = cell.trim();
    if let Ok(label) = cell.parse::<usize>() {
        return Some(label);
    }

    let value = cell.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Some(value as usize)
    } else {
        None
    }
}

/// Load the six model features and `label_column` from a CSV file.
///
/// Columns are found by header name; other columns are ignored.
pub fn load_labeled_dataset(path: &Path, label_column: &str) -> Result<LabeledDataset> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::Dataset(format!("Failed to open {}: {}", path.display(), e)))?;

    let headers = reader.headers()?.clone();
    let feature_columns = FEATURE_NAMES
        .iter()
        .map(|name| column_index(&headers, name, path))
        .collect::<Result<Vec<usize>>>()?;
    let label_index = column_index(&headers, label_column, path)?;

    let mut values = Vec::new();
    let mut labels = Vec::new();

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let row_number = row + 1;

        for (&column, name) in feature_columns.iter().zip(FEATURE_NAMES) {
            let cell = record.get(column).unwrap_or_default();
            let value = cell.trim().parse::<f64>().map_err(|_| {
                AppError::Dataset(format!(
                    "Row {}: column '{}' is not numeric: '{}'",
                    row_number, name, cell
                ))
            })?;
            values.push(value);
        }

        let cell = record.get(label_index).unwrap_or_default();
        let label = parse_label(cell).ok_or_else(|| {
            AppError::Dataset(format!(
                "Row {}: column '{}' is not a class label: '{}'",
                row_number, label_column, cell
            ))
        })?;
        labels.push(label);
    }

    if labels.is_empty() {
        return Err(AppError::Dataset(format!("{} contains no rows", path.display())));
    }

    let features = Array2::from_shape_vec((labels.len(), N_FEATURES), values)
        .map_err(|e| AppError::Dataset(e.to_string()))?;

    let dataset = LabeledDataset { features, labels };
    info!(
        path = %path.display(),
        rows = dataset.n_samples(),
        columns = N_FEATURES + 1,
        classes = ?dataset.classes(),
        "Loaded dataset"
    );

    Ok(dataset)
}
