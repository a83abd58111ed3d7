//! Shared fixtures for integration tests
#![allow(dead_code)]

use credit_risk_scorer::{
    config::TrainingConfig,
    ml::{
        Classifier, HyperParameters, ModelArtifact, ModelMetadata, ModelType, StandardScaler,
    },
    models::{feature_names, CustomerFeatures, RiskLevel, FEATURE_NAMES, N_FEATURES},
};
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::io::Write;
use std::path::Path;

/// Training config with one point per grid so tests stay fast
pub fn fast_training_config() -> TrainingConfig {
    TrainingConfig {
        cv_folds: 2,
        logistic_c: vec![1.0],
        logistic_max_iter: 200,
        gb_n_estimators: vec![10],
        gb_learning_rate: vec![0.1],
        gb_max_depth: 2,
        ..Default::default()
    }
}

/// Feature row loosely separated by `label`
fn synthetic_row(rng: &mut StdRng, label: usize) -> [f64; N_FEATURES] {
    let shift = label as f64 * 2.0;
    let mut row = [0.0; N_FEATURES];
    for value in row.iter_mut() {
        *value = shift + rng.gen_range(-0.5..0.5);
    }
    row
}

/// Synthetic feature matrix for `labels`
pub fn synthetic_features(labels: &[usize], seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = Array2::zeros((labels.len(), N_FEATURES));
    for (mut row, &label) in x.rows_mut().into_iter().zip(labels) {
        for (cell, value) in row.iter_mut().zip(synthetic_row(&mut rng, label)) {
            *cell = value;
        }
    }
    x
}

/// Write a labeled feature table with one row per entry of `labels`
pub fn write_dataset(path: &Path, labels: &[usize]) {
    let x = synthetic_features(labels, 7);
    let mut file = std::fs::File::create(path).unwrap();

    writeln!(file, "CustomerId,{},RiskCluster", FEATURE_NAMES.join(",")).unwrap();
    for (i, (row, label)) in x.rows().into_iter().zip(labels).enumerate() {
        let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(file, "CustomerId_{},{},{}", i, values.join(","), label).unwrap();
    }
}

/// Labels cycling through Low, Medium and High
pub fn cycling_labels(n: usize) -> Vec<usize> {
    (0..n).map(|i| i % 3).collect()
}

/// Uniformly random labels over the three risk levels
pub fn random_labels(n: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0..3)).collect()
}

/// Fitted boosting model and scaler over the serving features
pub fn trained_artifacts() -> (ModelArtifact, StandardScaler) {
    let labels = cycling_labels(30);
    let raw = synthetic_features(&labels, 11);
    let (scaler, x) = StandardScaler::fit_transform(&raw, feature_names()).unwrap();

    let params = HyperParameters::GradientBoosting {
        n_estimators: 10,
        learning_rate: 0.1,
        max_depth: 2,
    };
    let mut model = params.build();
    model.fit(&x, &labels).unwrap();

    let classes = model.classes().to_vec();
    let metadata = ModelMetadata {
        name: ModelType::GradientBoosting.candidate_name().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_type: ModelType::GradientBoosting,
        trained_at: chrono::Utc::now(),
        n_training_samples: labels.len(),
        feature_names: feature_names(),
        risk_levels: classes.iter().filter_map(|&c| RiskLevel::from_label(c)).collect(),
        classes,
        hyperparameters: params,
        cv_score: None,
        validation_metrics: None,
    };

    (ModelArtifact::new(metadata, model), scaler)
}

pub fn sample_record() -> CustomerFeatures {
    CustomerFeatures {
        log_monetary: 10.5,
        frequency: 12.0,
        log_avg_transaction_amount: 7.2,
        night_ratio: 0.1,
        freq_financial_services: 4.0,
        freq_airtime: 6.0,
    }
}
