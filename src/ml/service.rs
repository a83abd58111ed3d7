use crate::config::Config;
use crate::error::{AppError, Result};
use crate::ml::artifact::{load_artifact, ModelArtifact};
use crate::ml::models::ModelMetadata;
use crate::ml::scaler::StandardScaler;
use crate::models::{matches_feature_order, CustomerFeatures, RiskPrediction, FEATURE_NAMES};
use crate::tracking::{create_registry, load_model, ModelLoadOutcome, ModelSource};
use tracing::{debug, error, info, warn};

/// Serves risk probabilities from a loaded model and scaler.
///
/// Built once at startup and shared read-only across requests.
#[derive(Debug)]
pub struct PredictionService {
    /// Fitted classifier and its metadata
    artifact: ModelArtifact,

    /// Feature scaler; raw features are used when absent
    scaler: Option<StandardScaler>,

    /// Where the model was loaded from
    source: ModelSource,
}

impl PredictionService {
    /// Create a service from loaded artifacts.
    ///
    /// Rejects a model or scaler fit on a different feature order, and a model
    /// whose class labels do not all map to a risk level.
    pub fn new(
        artifact: ModelArtifact,
        scaler: Option<StandardScaler>,
        source: ModelSource,
    ) -> Result<Self> {
        if !matches_feature_order(&artifact.metadata.feature_names) {
            return Err(AppError::Artifact(format!(
                "Model was fit on features {:?}, expected {:?}",
                artifact.metadata.feature_names, FEATURE_NAMES
            )));
        }

        if let Some(scaler) = &scaler {
            if !matches_feature_order(scaler.feature_names()) {
                return Err(AppError::Artifact(format!(
                    "Scaler was fit on features {:?}, expected {:?}",
                    scaler.feature_names(),
                    FEATURE_NAMES
                )));
            }
        }

        artifact.risk_columns()?;

        Ok(Self {
            artifact,
            scaler,
            source,
        })
    }

    /// Load the model (registry first, then the local file) and the scaler.
    ///
    /// A missing scaler file is tolerated; an unreadable one is not.
    pub async fn initialize(config: &Config) -> Result<Self> {
        let registry = create_registry(&config.registry)?;

        let outcome = load_model(
            registry.as_deref(),
            &config.registry.model_name,
            &config.registry.stage,
            &config.artifacts.model_path,
        )
        .await;

        let (artifact, source) = match outcome {
            ModelLoadOutcome::FromRegistry { artifact, source } => (artifact, source),
            ModelLoadOutcome::FromFile {
                artifact, source, ..
            } => (artifact, source),
            ModelLoadOutcome::Unavailable {
                registry_error,
                file_error,
            } => {
                let registry_detail = registry_error
                    .map(|e| format!("registry: {}; ", e))
                    .unwrap_or_default();
                return Err(AppError::Artifact(format!(
                    "No model could be loaded ({}file: {})",
                    registry_detail, file_error
                )));
            }
        };

        let scaler_path = &config.artifacts.scaler_path;
        let scaler = if scaler_path.exists() {
            Some(load_artifact::<StandardScaler>(scaler_path)?)
        } else {
            warn!(
                path = %scaler_path.display(),
                "Scaler file not found, serving on raw features"
            );
            None
        };

        let service = Self::new(artifact, scaler, source)?;

        info!(
            model_type = %service.artifact.metadata.model_type,
            source = %service.source,
            scaler = service.has_scaler(),
            "Prediction service ready"
        );

        Ok(service)
    }

    /// Risk probabilities for each record, in input order
    pub fn predict(&self, records: &[CustomerFeatures]) -> Result<Vec<RiskPrediction>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        self.predict_batch(records).map_err(|e| {
            error!(batch_size = records.len(), error = %e, "Prediction failed");
            e
        })
    }

    fn predict_batch(&self, records: &[CustomerFeatures]) -> Result<Vec<RiskPrediction>> {
        let raw = CustomerFeatures::to_matrix(records);
        let x = match &self.scaler {
            Some(scaler) => scaler.transform(&raw)?,
            None => raw,
        };

        let proba = self.artifact.predict_risk_proba(&x)?;
        debug!(rows = proba.nrows(), "Computed risk probabilities");

        Ok(proba
            .rows()
            .into_iter()
            .map(|row| RiskPrediction::from_probabilities([row[0], row[1], row[2]]))
            .collect())
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    pub fn model_metadata(&self) -> &ModelMetadata {
        &self.artifact.metadata
    }

    pub fn has_scaler(&self) -> bool {
        self.scaler.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::artifact::tests::trained_artifact;
    use crate::ml::save_artifact;
    use crate::models::{feature_names, N_FEATURES};
    use ndarray::Array2;
    use std::path::PathBuf;

    fn file_source() -> ModelSource {
        ModelSource::File {
            path: PathBuf::from("models/best_model.bin"),
        }
    }

    fn record(log_monetary: f64) -> CustomerFeatures {
        CustomerFeatures {
            log_monetary,
            frequency: 5.0,
            log_avg_transaction_amount: 2.5,
            night_ratio: 0.1,
            freq_financial_services: 1.0,
            freq_airtime: 2.0,
        }
    }

    fn scaler() -> StandardScaler {
        let x = Array2::from_shape_fn((10, N_FEATURES), |(i, j)| (i * (j + 1)) as f64);
        StandardScaler::fit(&x, feature_names()).unwrap()
    }

    #[test]
    fn test_predict_preserves_order_and_normalizes() {
        let service =
            PredictionService::new(trained_artifact([0, 1, 2]), Some(scaler()), file_source())
                .unwrap();

        let records: Vec<CustomerFeatures> = (0..5).map(|i| record(i as f64 * 3.0)).collect();
        let predictions = service.predict(&records).unwrap();

        assert_eq!(predictions.len(), records.len());
        for prediction in &predictions {
            assert!((prediction.total() - 1.0).abs() < 1e-6);
            for level in crate::models::RiskLevel::ALL {
                assert!((0.0..=1.0).contains(&prediction.probability(level)));
            }
        }

        let single = service.predict(&records[3..4]).unwrap();
        assert_eq!(single[0], predictions[3]);
    }

    #[test]
    fn test_overflowing_record_is_prediction_error() {
        // Scale below 1 pushes 1e308 past f64::MAX
        let x = Array2::from_shape_fn((10, N_FEATURES), |(i, j)| (i * (j + 1)) as f64 * 0.01);
        let narrow = StandardScaler::fit(&x, feature_names()).unwrap();
        let service =
            PredictionService::new(trained_artifact([0, 1, 2]), Some(narrow), file_source())
                .unwrap();

        let huge = CustomerFeatures::from_row([1e308; N_FEATURES]);
        let err = service.predict(&[record(1.0), huge]).unwrap_err();
        assert!(matches!(err, AppError::Prediction(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_empty_batch() {
        let service =
            PredictionService::new(trained_artifact([0, 1, 2]), None, file_source()).unwrap();
        assert!(service.predict(&[]).unwrap().is_empty());
        assert!(!service.has_scaler());
    }

    #[test]
    fn test_rejects_feature_order_mismatch() {
        let mut artifact = trained_artifact([0, 1, 2]);
        artifact.metadata.feature_names.swap(0, 1);
        let err = PredictionService::new(artifact, None, file_source()).unwrap_err();
        assert!(matches!(err, AppError::Artifact(_)));

        let x = Array2::zeros((3, N_FEATURES));
        let mut names = feature_names();
        names.reverse();
        let reversed = StandardScaler::fit(&x, names).unwrap();
        let err = PredictionService::new(trained_artifact([0, 1, 2]), Some(reversed), file_source())
            .unwrap_err();
        assert!(matches!(err, AppError::Artifact(_)));
    }

    #[test]
    fn test_rejects_unmapped_class() {
        let err = PredictionService::new(trained_artifact([0, 1, 5]), None, file_source())
            .unwrap_err();
        assert!(matches!(err, AppError::Artifact(_)));
    }

    #[tokio::test]
    async fn test_initialize_without_scaler_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.artifacts.model_path = dir.path().join("best_model.bin");
        config.artifacts.scaler_path = dir.path().join("scaler.bin");
        save_artifact(&config.artifacts.model_path, &trained_artifact([0, 1, 2])).unwrap();

        let service = PredictionService::initialize(&config).await.unwrap();
        assert!(!service.has_scaler());
        assert_eq!(service.source().kind(), "file");
        assert_eq!(service.predict(&[record(1.0)]).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_initialize_fails_on_corrupt_scaler() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.artifacts.model_path = dir.path().join("best_model.bin");
        config.artifacts.scaler_path = dir.path().join("scaler.bin");
        save_artifact(&config.artifacts.model_path, &trained_artifact([0, 1, 2])).unwrap();
        std::fs::write(&config.artifacts.scaler_path, b"garbage").unwrap();

        assert!(PredictionService::initialize(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_initialize_fails_without_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.artifacts.model_path = dir.path().join("missing.bin");

        let err = PredictionService::initialize(&config).await.unwrap_err();
        assert!(matches!(err, AppError::Artifact(_)));
    }
}
