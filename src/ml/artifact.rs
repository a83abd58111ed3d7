use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, TrainedModel};
use crate::ml::models::ModelMetadata;
use crate::models::RiskLevel;
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// A fitted model together with everything needed to serve it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub model: TrainedModel,
}

impl ModelArtifact {
    pub fn new(metadata: ModelMetadata, model: TrainedModel) -> Self {
        Self { metadata, model }
    }

    /// Raw class probabilities, columns ordered by the trained classes
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.model.predict_proba(x)
    }

    /// Low/Medium/High column index of each model probability column.
    ///
    /// Fails if the recorded classes disagree with the fitted model or a class
    /// label has no risk level.
    pub fn risk_columns(&self) -> Result<Vec<usize>> {
        let classes = self.model.classes();

        if self.metadata.classes != classes {
            return Err(AppError::Artifact(format!(
                "Metadata records classes {:?} but the model was fit on {:?}",
                self.metadata.classes, classes
            )));
        }

        let mut columns = Vec::with_capacity(classes.len());
        for &class in classes {
            let level = RiskLevel::from_label(class).ok_or_else(|| {
                AppError::Artifact(format!("Class label {} has no risk level", class))
            })?;

            if columns.contains(&level.index()) {
                return Err(AppError::Artifact(format!(
                    "Risk level {} is mapped more than once",
                    level
                )));
            }
            columns.push(level.index());
        }

        Ok(columns)
    }

    /// Probabilities as an N×3 matrix in Low/Medium/High order.
    ///
    /// Levels the model never saw during training get probability 0. Fails
    /// with `AppError::Prediction` when an input or a probability is not
    /// finite.
    pub fn predict_risk_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let columns = self.risk_columns()?;

        if let Some(((row, col), value)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(AppError::Prediction(format!(
                "Input contains a non-finite value ({}) at row {}, feature {}",
                value, row, col
            )));
        }

        let proba = self.predict_proba(x)?;
        if let Some(row) = proba
            .rows()
            .into_iter()
            .position(|r| r.iter().any(|p| !p.is_finite()))
        {
            return Err(AppError::Prediction(format!(
                "Model produced non-finite probabilities for row {}",
                row
            )));
        }

        if proba.ncols() != columns.len() {
            return Err(AppError::Prediction(format!(
                "Model returned {} probability columns for {} classes",
                proba.ncols(),
                columns.len()
            )));
        }

        let mut risk = Array2::zeros((proba.nrows(), RiskLevel::ALL.len()));
        for (source, &target) in columns.iter().enumerate() {
            risk.column_mut(target).assign(&proba.column(source));
        }

        Ok(risk)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| AppError::Artifact(format!("Failed to decode model artifact: {}", e)))
    }
}

/// Serialize `value` to `path` with bincode, creating parent directories
pub fn save_artifact<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let bytes = bincode::serialize(value)?;
    std::fs::write(path, &bytes)?;

    debug!(path = %path.display(), bytes = bytes.len(), "Saved artifact");
    Ok(())
}

/// Deserialize a bincode artifact from `path`
pub fn load_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| {
        AppError::Artifact(format!("Failed to read {}: {}", path.display(), e))
    })?;

    bincode::deserialize(&bytes).map_err(|e| {
        AppError::Artifact(format!("Failed to decode {}: {}", path.display(), e))
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ml::classifier::tests::{fixed_logistic, separable_dataset};
    use crate::ml::models::{HyperParameters, ModelType};
    use crate::ml::StandardScaler;
    use crate::models::{feature_names, N_FEATURES};

    /// Small trained boosting artifact over the six serving features
    pub(crate) fn trained_artifact(labels: [usize; 3]) -> ModelArtifact {
        let (x3, y) = separable_dataset(6);
        let mut x = Array2::zeros((x3.nrows(), N_FEATURES));
        x.slice_mut(ndarray::s![.., 0..3]).assign(&x3);
        let y: Vec<usize> = y.into_iter().map(|k| labels[k]).collect();

        let params = HyperParameters::GradientBoosting {
            n_estimators: 5,
            learning_rate: 0.1,
            max_depth: 2,
        };
        let mut model = params.build();
        model.fit(&x, &y).unwrap();

        let classes = model.classes().to_vec();
        let metadata = ModelMetadata {
            name: "GradientBoosting".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            model_type: ModelType::GradientBoosting,
            trained_at: chrono::Utc::now(),
            n_training_samples: x.nrows(),
            feature_names: feature_names(),
            risk_levels: classes.iter().filter_map(|&c| RiskLevel::from_label(c)).collect(),
            classes,
            hyperparameters: params,
            cv_score: None,
            validation_metrics: None,
        };

        ModelArtifact::new(metadata, model)
    }

    #[test]
    fn test_risk_proba_follows_label_mapping() {
        let artifact = trained_artifact([0, 1, 2]);
        let x = Array2::zeros((2, N_FEATURES));

        let raw = artifact.predict_proba(&x).unwrap();
        let risk = artifact.predict_risk_proba(&x).unwrap();
        assert_eq!(risk, raw);
    }

    #[test]
    fn test_missing_level_gets_zero() {
        let artifact = trained_artifact([0, 2, 2]);
        assert_eq!(artifact.risk_columns().unwrap(), vec![0, 2]);

        let risk = artifact.predict_risk_proba(&Array2::zeros((3, N_FEATURES))).unwrap();
        assert_eq!(risk.ncols(), 3);
        for row in risk.rows() {
            assert_eq!(row[1], 0.0);
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let artifact = trained_artifact([0, 1, 2]);
        let mut x = Array2::zeros((2, N_FEATURES));
        x[[1, 3]] = f64::INFINITY;

        let err = artifact.predict_risk_proba(&x).unwrap_err();
        assert!(matches!(err, AppError::Prediction(_)));
    }

    #[test]
    fn test_overflowing_logits_rejected() {
        let mut artifact = trained_artifact([0, 1, 2]);
        artifact.model = TrainedModel::LogisticRegression(fixed_logistic(N_FEATURES, 1.0));

        let x = Array2::from_elem((1, N_FEATURES), 1e308);
        let err = artifact.predict_risk_proba(&x).unwrap_err();
        assert!(matches!(err, AppError::Prediction(_)));

        let ok = artifact.predict_risk_proba(&Array2::zeros((1, N_FEATURES))).unwrap();
        assert!((ok.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_label_rejected() {
        let artifact = trained_artifact([0, 1, 7]);
        assert!(matches!(artifact.risk_columns(), Err(AppError::Artifact(_))));
    }

    #[test]
    fn test_metadata_class_mismatch_rejected() {
        let mut artifact = trained_artifact([0, 1, 2]);
        artifact.metadata.classes = vec![0, 1];
        assert!(artifact.risk_columns().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("nested/model.bin");
        let scaler_path = dir.path().join("scaler.bin");

        let artifact = trained_artifact([0, 1, 2]);
        save_artifact(&model_path, &artifact).unwrap();

        let x = Array2::from_elem((4, N_FEATURES), 0.5);
        let scaler = StandardScaler::fit(&x, feature_names()).unwrap();
        save_artifact(&scaler_path, &scaler).unwrap();

        let loaded: ModelArtifact = load_artifact(&model_path).unwrap();
        assert_eq!(
            loaded.predict_proba(&x).unwrap(),
            artifact.predict_proba(&x).unwrap()
        );
        assert_eq!(load_artifact::<StandardScaler>(&scaler_path).unwrap(), scaler);
    }

    #[test]
    fn test_corrupt_file_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"not a model").unwrap();

        let err = load_artifact::<ModelArtifact>(&path).unwrap_err();
        assert!(matches!(err, AppError::Artifact(_)));

        let err = load_artifact::<ModelArtifact>(&dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, AppError::Artifact(_)));
    }
}
