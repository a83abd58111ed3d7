use crate::config::TrainingConfig;
use crate::data::{load_labeled_dataset, train_test_split};
use crate::error::{AppError, Result};
use crate::ml::{
    boosting_grid, evaluate, logistic_grid, save_artifact, Classifier, GridSearch,
    HyperParameters, ModelArtifact, ModelMetadata, ModelMetrics, ModelType, StandardScaler,
};
use crate::models::{feature_names, RiskLevel};
use crate::tracking::{ExperimentTracker, ModelRegistry};
use chrono::Utc;
use ndarray::Array2;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};
use validator::Validate;

/// Where to register the selected model
#[derive(Clone, Copy)]
pub struct RegistryTarget<'a> {
    pub registry: &'a dyn ModelRegistry,
    pub name: &'a str,
    pub stage: &'a str,
}

/// Held-out results for one candidate family
#[derive(Debug, Clone)]
pub struct CandidateReport {
    pub name: String,
    pub params: HyperParameters,

    /// Mean cross-validated weighted F1 of `params`
    pub cv_score: f64,

    pub metrics: ModelMetrics,
}

/// Everything a training run produced
#[derive(Debug)]
pub struct TrainingOutcome {
    /// Selected model, also written to the model output path
    pub model: ModelArtifact,

    /// Scaler fit on the training partition
    pub scaler: StandardScaler,

    pub candidates: Vec<CandidateReport>,

    /// Name of the selected candidate
    pub selected: String,

    pub run_id: String,
}

struct Partition {
    x: Array2<f64>,
    y: Vec<usize>,
}

fn train_candidate(
    model_type: ModelType,
    grid: Vec<HyperParameters>,
    config: &TrainingConfig,
    train: &Partition,
    test: &Partition,
) -> Result<(ModelArtifact, CandidateReport)> {
    let name = model_type.candidate_name();
    info!(candidate = name, grid_size = grid.len(), "Running grid search");

    let search = GridSearch::new(grid, config.cv_folds).fit(&train.x, &train.y)?;
    let metrics = evaluate(&search.best_model, &test.x, &test.y)?;

    let classes = search.best_model.classes().to_vec();
    let risk_levels = classes
        .iter()
        .map(|&c| RiskLevel::from_label(c))
        .collect::<Option<Vec<RiskLevel>>>()
        .ok_or_else(|| AppError::Training(format!("Classes {:?} include an unknown label", classes)))?;

    let metadata = ModelMetadata {
        name: name.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_type,
        trained_at: Utc::now(),
        n_training_samples: train.y.len(),
        feature_names: feature_names(),
        classes,
        risk_levels,
        hyperparameters: search.best_params.clone(),
        cv_score: search.best_score.is_finite().then_some(search.best_score),
        validation_metrics: Some(metrics.clone()),
    };

    let report = CandidateReport {
        name: name.to_string(),
        params: search.best_params,
        cv_score: search.best_score,
        metrics,
    };

    Ok((ModelArtifact::new(metadata, search.best_model), report))
}

fn log_candidate(
    tracker: &dyn ExperimentTracker,
    artifact: &ModelArtifact,
    report: &CandidateReport,
) -> Result<()> {
    let name = &report.name;
    let metrics = &report.metrics;

    tracker.log_model(name, artifact)?;
    tracker.log_metric(&format!("{}_f1", name), metrics.f1_score)?;
    tracker.log_metric(&format!("{}_accuracy", name), metrics.accuracy)?;
    tracker.log_metric(&format!("{}_precision", name), metrics.precision)?;
    tracker.log_metric(&format!("{}_recall", name), metrics.recall)?;
    tracker.log_metric(&format!("{}_roc_auc", name), metrics.roc_auc_or_nan())?;
    tracker.log_metric(&format!("{}_cv_f1", name), report.cv_score)?;

    for (param, value) in report.params.to_map() {
        tracker.log_param(&format!("{}_{}", name, param), &value)?;
    }

    Ok(())
}

/// Train both candidate families, persist the scaler and the winner, and
/// record every candidate with `tracker`.
pub async fn train_and_log_model(
    data_path: &Path,
    model_out: &Path,
    scaler_out: &Path,
    config: &TrainingConfig,
    tracker: &dyn ExperimentTracker,
    registry: Option<RegistryTarget<'_>>,
) -> Result<TrainingOutcome> {
    config.validate()?;
    let started = Instant::now();

    let dataset = load_labeled_dataset(data_path, &config.label_column).map_err(|e| {
        error!(path = %data_path.display(), error = %e, "Failed to load training data");
        e
    })?;

    if let Some(label) = dataset.labels.iter().find(|&&l| RiskLevel::from_label(l).is_none()) {
        return Err(AppError::Dataset(format!(
            "Label {} in column '{}' has no risk level (expected 0, 1 or 2)",
            label, config.label_column
        )));
    }

    let (train_idx, test_idx) = train_test_split(dataset.n_samples(), config.test_size, config.seed);
    let train_set = dataset.select(&train_idx);
    let test_set = dataset.select(&test_idx);

    let (scaler, x_train) = StandardScaler::fit_transform(&train_set.features, feature_names())?;
    let x_test = scaler.transform(&test_set.features)?;
    save_artifact(scaler_out, &scaler)?;
    info!(path = %scaler_out.display(), "Scaler saved");

    tracker.log_param("test_size", &config.test_size.to_string())?;
    tracker.log_param("seed", &config.seed.to_string())?;
    tracker.log_param("cv_folds", &config.cv_folds.to_string())?;
    tracker.log_param("n_train", &train_idx.len().to_string())?;
    tracker.log_param("n_test", &test_idx.len().to_string())?;

    let train = Partition {
        x: x_train,
        y: train_set.labels,
    };
    let test = Partition {
        x: x_test,
        y: test_set.labels,
    };

    let candidates = [
        (ModelType::LogisticRegression, logistic_grid(config)),
        (ModelType::GradientBoosting, boosting_grid(config)),
    ];

    let mut reports = Vec::new();
    let mut best: Option<(f64, ModelArtifact)> = None;

    for (model_type, grid) in candidates {
        let (artifact, report) = match train_candidate(model_type, grid, config, &train, &test) {
            Ok(trained) => trained,
            Err(e) => {
                warn!(candidate = model_type.candidate_name(), error = %e, "Candidate failed, skipping");
                continue;
            }
        };

        info!(
            candidate = %report.name,
            params = %report.params,
            f1 = report.metrics.f1_score,
            accuracy = report.metrics.accuracy,
            precision = report.metrics.precision,
            recall = report.metrics.recall,
            roc_auc = report.metrics.roc_auc_or_nan(),
            "Evaluated candidate"
        );

        log_candidate(tracker, &artifact, &report)?;

        let f1 = report.metrics.f1_score;
        if best.as_ref().map_or(true, |(best_f1, _)| f1 > *best_f1) {
            best = Some((f1, artifact));
        }
        reports.push(report);
    }

    let (best_f1, model) =
        best.ok_or_else(|| AppError::Training("No candidate model could be trained".to_string()))?;
    let selected = model.metadata.name.clone();

    save_artifact(model_out, &model)?;
    tracker.log_param("selected_model", &selected)?;
    info!(
        selected = %selected,
        f1 = best_f1,
        path = %model_out.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Best model saved"
    );

    if let Some(target) = registry {
        target
            .registry
            .register(target.name, target.stage, &model)
            .await?;
    }

    Ok(TrainingOutcome {
        model,
        scaler,
        candidates: reports,
        selected,
        run_id: tracker.run_id().to_string(),
    })
}
