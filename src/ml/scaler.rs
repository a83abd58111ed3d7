use crate::error::{AppError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature standardization (zero mean, unit variance)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Column names the scaler was fit on, in order
    feature_names: Vec<String>,

    /// Per-column mean
    mean: Array1<f64>,

    /// Per-column population standard deviation (1.0 for constant columns)
    scale: Array1<f64>,

    /// Rows seen during fit
    n_samples_seen: usize,
}

impl StandardScaler {
    /// Fit on `x`, whose columns are named by `feature_names`
    pub fn fit(x: &Array2<f64>, feature_names: Vec<String>) -> Result<Self> {
        if x.ncols() != feature_names.len() {
            return Err(AppError::Training(format!(
                "Scaler got {} feature names for {} columns",
                feature_names.len(),
                x.ncols()
            )));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| AppError::Training("Cannot fit scaler on an empty matrix".to_string()))?;

        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std > f64::EPSILON { std } else { 1.0 });

        Ok(Self {
            feature_names,
            mean,
            scale,
            n_samples_seen: x.nrows(),
        })
    }

    /// Fit and transform in one step
    pub fn fit_transform(x: &Array2<f64>, feature_names: Vec<String>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(x, feature_names)?;
        let scaled = scaler.transform(x)?;
        Ok((scaler, scaled))
    }

    /// Standardize `x` with the fitted parameters
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(AppError::Prediction(format!(
                "Scaler expects {} features, got {}",
                self.n_features(),
                x.ncols()
            )));
        }

        Ok((x - &self.mean) / &self.scale)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }
}
