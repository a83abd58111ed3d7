use crate::config::TrainingConfig;
use crate::error::{AppError, Result};
use crate::ml::classifier::{unique_classes, Classifier, TrainedModel};
use crate::ml::evaluation::f1_weighted;
use crate::ml::models::HyperParameters;
use ndarray::{Array2, Axis};
use tracing::{debug, info, warn};

/// Logistic regression grid over the configured regularization strengths
pub fn logistic_grid(config: &TrainingConfig) -> Vec<HyperParameters> {
    config
        .logistic_c
        .iter()
        .map(|&c| HyperParameters::LogisticRegression {
            c,
            max_iterations: config.logistic_max_iter,
        })
        .collect()
}

/// Gradient boosting grid, learning rate outermost
pub fn boosting_grid(config: &TrainingConfig) -> Vec<HyperParameters> {
    config
        .gb_learning_rate
        .iter()
        .flat_map(|&learning_rate| {
            config
                .gb_n_estimators
                .iter()
                .map(move |&n_estimators| HyperParameters::GradientBoosting {
                    n_estimators,
                    learning_rate,
                    max_depth: config.gb_max_depth,
                })
        })
        .collect()
}

/// Stratified k-fold split as `(train, test)` index pairs.
///
/// Rows of each class are dealt round-robin across folds, continuing the
/// rotation from one class to the next so fold sizes stay balanced.
pub fn stratified_k_fold(y: &[usize], k: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 {
        return Err(AppError::Training(format!(
            "Cross-validation needs at least 2 folds, got {}",
            k
        )));
    }

    if y.len() < k {
        return Err(AppError::Training(format!(
            "Cannot split {} samples into {} folds",
            y.len(),
            k
        )));
    }

    let mut assignment = vec![0usize; y.len()];
    let mut counter = 0;
    for class in unique_classes(y) {
        for (i, _) in y.iter().enumerate().filter(|(_, label)| **label == class) {
            assignment[i] = counter % k;
            counter += 1;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&i| assignment[i] == fold);
            (train, test)
        })
        .collect())
}

/// Cross-validation outcome for one grid point
#[derive(Debug, Clone)]
pub struct CvResult {
    pub params: HyperParameters,

    /// Weighted F1 per fold; NaN for folds that could not be scored
    pub fold_scores: Vec<f64>,

    /// Mean of `fold_scores`; NaN if any fold is NaN
    pub mean_score: f64,
}

/// Result of a grid search
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best_params: HyperParameters,
    pub best_score: f64,

    /// Best configuration refit on all training rows
    pub best_model: TrainedModel,

    pub cv_results: Vec<CvResult>,
}

/// Exhaustive search over a hyperparameter grid scored by weighted F1
#[derive(Debug, Clone)]
pub struct GridSearch {
    grid: Vec<HyperParameters>,
    cv_folds: usize,
}

impl GridSearch {
    pub fn new(grid: Vec<HyperParameters>, cv_folds: usize) -> Self {
        Self { grid, cv_folds }
    }

    pub fn grid(&self) -> &[HyperParameters] {
        &self.grid
    }

    fn score_fold(
        params: &HyperParameters,
        x: &Array2<f64>,
        y: &[usize],
        train: &[usize],
        test: &[usize],
    ) -> f64 {
        let y_train: Vec<usize> = train.iter().map(|&i| y[i]).collect();
        if unique_classes(&y_train).len() < 2 {
            warn!(params = %params, "Fold training split has a single class, scoring NaN");
            return f64::NAN;
        }

        let mut model = params.build();
        let x_train = x.select(Axis(0), train);
        if let Err(e) = model.fit(&x_train, &y_train) {
            warn!(params = %params, error = %e, "Fold fit failed, scoring NaN");
            return f64::NAN;
        }

        let x_test = x.select(Axis(0), test);
        let y_test: Vec<usize> = test.iter().map(|&i| y[i]).collect();
        match model.predict(&x_test) {
            Ok(y_pred) => f1_weighted(&y_test, &y_pred),
            Err(e) => {
                warn!(params = %params, error = %e, "Fold prediction failed, scoring NaN");
                f64::NAN
            }
        }
    }

    /// Cross-validate every grid point and refit the best on all of `x`
    pub fn fit(&self, x: &Array2<f64>, y: &[usize]) -> Result<GridSearchResult> {
        if self.grid.is_empty() {
            return Err(AppError::Training("Hyperparameter grid is empty".to_string()));
        }

        let folds = stratified_k_fold(y, self.cv_folds)?;

        let cv_results: Vec<CvResult> = self
            .grid
            .iter()
            .map(|params| {
                let fold_scores: Vec<f64> = folds
                    .iter()
                    .map(|(train, test)| Self::score_fold(params, x, y, train, test))
                    .collect();
                let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;

                debug!(params = %params, mean_score, "Scored grid point");

                CvResult {
                    params: params.clone(),
                    fold_scores,
                    mean_score,
                }
            })
            .collect();

        let mut best_index = 0;
        let mut best_score = f64::NAN;
        for (i, result) in cv_results.iter().enumerate() {
            let improves = best_score.is_nan() || result.mean_score > best_score;
            if result.mean_score.is_finite() && improves {
                best_index = i;
                best_score = result.mean_score;
            }
        }

        if best_score.is_nan() {
            warn!("No grid point produced a finite score, using the first configuration");
        }

        let best_params = cv_results[best_index].params.clone();
        info!(params = %best_params, best_score, "Grid search finished");

        let mut best_model = best_params.build();
        best_model.fit(x, y)?;

        Ok(GridSearchResult {
            best_params,
            best_score,
            best_model,
            cv_results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::tests::separable_dataset;
    use crate::ml::models::ModelType;

    #[test]
    fn test_grids_follow_config() {
        let config = TrainingConfig::default();

        let logistic = logistic_grid(&config);
        assert_eq!(logistic.len(), 3);
        assert_eq!(
            logistic[0],
            HyperParameters::LogisticRegression {
                c: 0.1,
                max_iterations: 2000
            }
        );

        let boosting = boosting_grid(&config);
        assert_eq!(boosting.len(), 4);
        assert_eq!(
            boosting[1],
            HyperParameters::GradientBoosting {
                n_estimators: 100,
                learning_rate: 0.05,
                max_depth: 3
            }
        );
    }

    #[test]
    fn test_stratified_folds_partition_rows() {
        let y = [0, 0, 0, 1, 1, 1, 2, 2, 2];
        let folds = stratified_k_fold(&y, 3).unwrap();
        assert_eq!(folds.len(), 3);

        let mut seen: Vec<usize> = folds.iter().flat_map(|(_, test)| test.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..9).collect::<Vec<_>>());

        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), 9);
            let labels: Vec<usize> = test.iter().map(|&i| y[i]).collect();
            assert_eq!(unique_classes(&labels), vec![0, 1, 2]);
        }
    }

    #[test]
    fn test_too_few_samples_for_folds() {
        assert!(stratified_k_fold(&[0, 1], 3).is_err());
        assert!(stratified_k_fold(&[0, 1, 0], 1).is_err());
    }

    #[test]
    fn test_grid_search_picks_and_refits() {
        let (x, y) = separable_dataset(10);
        let search = GridSearch::new(
            vec![
                HyperParameters::GradientBoosting {
                    n_estimators: 5,
                    learning_rate: 0.1,
                    max_depth: 2,
                },
                HyperParameters::GradientBoosting {
                    n_estimators: 10,
                    learning_rate: 0.1,
                    max_depth: 2,
                },
            ],
            3,
        );

        let result = search.fit(&x, &y).unwrap();
        assert_eq!(result.cv_results.len(), 2);
        assert!(result.best_score.is_finite());
        assert!(result.best_model.is_trained());
        assert_eq!(result.best_model.model_type(), ModelType::GradientBoosting);
        assert_eq!(result.best_model.classes(), &[0, 1, 2]);
    }

    #[test]
    fn test_single_class_folds_score_nan() {
        // Class 1 appears once, so the fold testing on it trains on class 0 alone
        let x = Array2::from_shape_fn((4, 1), |(i, _)| i as f64);
        let y = [0, 0, 0, 1];
        let search = GridSearch::new(
            vec![HyperParameters::GradientBoosting {
                n_estimators: 3,
                learning_rate: 0.1,
                max_depth: 1,
            }],
            3,
        );

        let result = search.fit(&x, &y).unwrap();
        assert!(result.cv_results[0].mean_score.is_nan());
        assert!(result.best_score.is_nan());
        assert!(result.best_model.is_trained());
    }
}
