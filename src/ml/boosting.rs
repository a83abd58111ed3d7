//! Softmax gradient boosting over depth-limited regression trees.
//!
//! Each stage fits one tree per class to the negative gradient of the
//! multinomial deviance; leaf values take a single Newton step. Raw scores
//! start from the log class priors.

use crate::error::{AppError, Result};
use crate::ml::classifier::{check_fit_input, softmax_rows, Classifier};
use crate::ml::models::ModelType;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Node of a regression tree; children are indices into the node list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Regression tree stored as a flat node list rooted at index 0
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

struct TreeFitter<'a> {
    x: &'a Array2<f64>,
    residuals: &'a [f64],
    hessians: &'a [f64],
    max_depth: usize,
    min_samples_leaf: usize,
    leaf_scale: f64,
}

impl RegressionTree {
    /// Fit to `residuals` with Newton leaves `scale * Σr / Σh`
    fn fit(fitter: &TreeFitter<'_>) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let indices: Vec<usize> = (0..fitter.x.nrows()).collect();
        tree.grow(fitter, indices, 0);
        tree
    }

    fn grow(&mut self, fitter: &TreeFitter<'_>, indices: Vec<usize>, depth: usize) -> usize {
        let node = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            value: fitter.leaf_value(&indices),
        });

        if depth >= fitter.max_depth || indices.len() < 2 * fitter.min_samples_leaf {
            return node;
        }

        let Some((feature, threshold)) = fitter.best_split(&indices) else {
            return node;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| fitter.x[[i, feature]] <= threshold);

        let left = self.grow(fitter, left_indices, depth + 1);
        let right = self.grow(fitter, right_indices, depth + 1);
        self.nodes[node] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };

        node
    }

    /// Predict one row
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Predict every row of `x`
    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], index: usize) -> usize {
            match &nodes[index] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }

        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

impl TreeFitter<'_> {
    fn leaf_value(&self, indices: &[usize]) -> f64 {
        let numerator: f64 = indices.iter().map(|&i| self.residuals[i]).sum();
        let denominator: f64 = indices.iter().map(|&i| self.hessians[i]).sum();

        if denominator.abs() < 1e-150 {
            0.0
        } else {
            self.leaf_scale * numerator / denominator
        }
    }

    /// Split maximizing the reduction in squared error of the residuals
    fn best_split(&self, indices: &[usize]) -> Option<(usize, f64)> {
        let n = indices.len();
        let total: f64 = indices.iter().map(|&i| self.residuals[i]).sum();
        let parent_score = total * total / n as f64;

        let mut best: Option<(usize, f64, f64)> = None;
        let mut sorted = indices.to_vec();

        for feature in 0..self.x.ncols() {
            sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let mut left_sum = 0.0;
            for split in 1..n {
                left_sum += self.residuals[sorted[split - 1]];

                if split < self.min_samples_leaf || n - split < self.min_samples_leaf {
                    continue;
                }

                let lower = self.x[[sorted[split - 1], feature]];
                let upper = self.x[[sorted[split], feature]];
                if lower >= upper {
                    continue;
                }

                let right_sum = total - left_sum;
                let score = left_sum * left_sum / split as f64
                    + right_sum * right_sum / (n - split) as f64;
                let gain = score - parent_score;

                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, lower + (upper - lower) / 2.0, gain));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

/// Multiclass gradient boosting classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    /// Boosting stages
    n_estimators: usize,

    /// Shrinkage applied to each tree
    learning_rate: f64,

    /// Depth of each tree
    max_depth: usize,

    /// Minimum rows per leaf
    min_samples_leaf: usize,

    /// Trained class labels
    classes: Vec<usize>,

    /// Log class priors used as starting raw scores
    init_scores: Vec<f64>,

    /// `stages[m][k]` is the tree for class `k` at stage `m`
    stages: Vec<Vec<RegressionTree>>,
}

impl GradientBoostingClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64, max_depth: usize) -> Self {
        Self {
            n_estimators,
            learning_rate,
            max_depth,
            min_samples_leaf: 1,
            classes: Vec::new(),
            init_scores: Vec::new(),
            stages: Vec::new(),
        }
    }

    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Number of fitted stages
    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Array2<f64> {
        let n_classes = self.classes.len();
        let mut raw = Array2::zeros((x.nrows(), n_classes));
        for (k, &init) in self.init_scores.iter().enumerate() {
            raw.column_mut(k).fill(init);
        }

        for stage in &self.stages {
            for (k, tree) in stage.iter().enumerate() {
                let update = tree.predict(x) * self.learning_rate;
                let mut column = raw.column_mut(k);
                column += &update;
            }
        }

        raw
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        let classes = check_fit_input(x, y)?;
        let n_samples = x.nrows();
        let n_classes = classes.len();

        let encoded: Vec<usize> = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        let mut counts = vec![0usize; n_classes];
        for &k in &encoded {
            counts[k] += 1;
        }
        let init_scores: Vec<f64> = counts
            .iter()
            .map(|&c| (c as f64 / n_samples as f64).ln())
            .collect();

        let mut raw = Array2::zeros((n_samples, n_classes));
        for (k, &init) in init_scores.iter().enumerate() {
            raw.column_mut(k).fill(init);
        }

        let leaf_scale = (n_classes as f64 - 1.0) / n_classes as f64;
        let mut stages = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            let proba = softmax_rows(raw.clone());
            let mut trees = Vec::with_capacity(n_classes);

            for k in 0..n_classes {
                let column = proba.index_axis(Axis(1), k);
                let residuals: Vec<f64> = encoded
                    .iter()
                    .zip(column.iter())
                    .map(|(&label, &p)| if label == k { 1.0 - p } else { -p })
                    .collect();
                let hessians: Vec<f64> = column.iter().map(|&p| p * (1.0 - p)).collect();

                let tree = RegressionTree::fit(&TreeFitter {
                    x,
                    residuals: &residuals,
                    hessians: &hessians,
                    max_depth: self.max_depth,
                    min_samples_leaf: self.min_samples_leaf,
                    leaf_scale,
                });

                let update = tree.predict(x) * self.learning_rate;
                let mut raw_column = raw.column_mut(k);
                raw_column += &update;
                trees.push(tree);
            }

            stages.push(trees);
        }

        if raw.iter().any(|v| !v.is_finite()) {
            return Err(AppError::Training(
                "Gradient boosting diverged to non-finite scores".to_string(),
            ));
        }

        self.classes = classes;
        self.init_scores = init_scores;
        self.stages = stages;

        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_trained() {
            return Err(AppError::Prediction("Model not trained".to_string()));
        }

        Ok(softmax_rows(self.raw_scores(x)))
    }

    fn classes(&self) -> &[usize] {
        &self.classes
    }

    fn model_type(&self) -> ModelType {
        ModelType::GradientBoosting
    }

    fn is_trained(&self) -> bool {
        !self.classes.is_empty()
    }
}
