//! Random forest built from linfa decision trees
//!
//! Each tree is fitted on a bootstrap sample of the rows and a random subset
//! of the feature columns. Class probabilities are the share of trees voting
//! for each class.

use linfa::prelude::*;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Number of feature columns each tree sees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    All,
    #[default]
    Sqrt,
}

impl MaxFeatures {
    fn count(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub max_features: MaxFeatures,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            max_features: MaxFeatures::Sqrt,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForestTree {
    /// Columns of the full feature matrix this tree was fitted on
    features: Vec<usize>,
    tree: DecisionTree<f64, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    /// Sorted distinct labels seen during fit
    classes: Vec<u32>,
    trees: Vec<ForestTree>,
}

impl RandomForest {
    pub fn fit(x: &Array2<f64>, y: &[u32], params: &ForestParams) -> Result<Self> {
        let (n_rows, n_features) = x.dim();
        if n_rows == 0 || n_features == 0 {
            return Err(PipelineError::EmptyTrainingSet(
                "no rows or no feature columns to fit".to_string(),
            ));
        }
        if y.len() != n_rows {
            return Err(PipelineError::Model(format!(
                "{} labels for {} rows",
                y.len(),
                n_rows
            )));
        }

        let mut classes: Vec<u32> = y.to_vec();
        classes.sort_unstable();
        classes.dedup();

        let mut rng = StdRng::seed_from_u64(params.seed);
        let per_tree = params.max_features.count(n_features);
        let mut trees = Vec::with_capacity(params.n_trees);

        for _ in 0..params.n_trees.max(1) {
            let rows: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
            let mut features =
                rand::seq::index::sample(&mut rng, n_features, per_tree).into_vec();
            features.sort_unstable();

            let records = x.select(Axis(0), &rows).select(Axis(1), &features);
            let targets: Array1<usize> = rows.iter().map(|&r| y[r] as usize).collect();

            let tree = DecisionTree::params()
                .split_quality(SplitQuality::Gini)
                .max_depth(params.max_depth)
                .fit(&Dataset::new(records, targets))
                .map_err(|e| PipelineError::Model(e.to_string()))?;

            trees.push(ForestTree { features, tree });
        }

        Ok(Self {
            n_features,
            classes,
            trees,
        })
    }

    pub fn classes(&self) -> &[u32] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Vote share per class; columns follow `classes()`
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features {
            return Err(PipelineError::Model(format!(
                "expected {} feature columns, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        let mut votes = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        if x.nrows() == 0 {
            return Ok(votes);
        }

        for member in &self.trees {
            let sub = x.select(Axis(1), &member.features);
            let predicted = member.tree.predict(&sub);
            for (row, label) in predicted.iter().enumerate() {
                if let Ok(col) = self.classes.binary_search(&(*label as u32)) {
                    votes[[row, col]] += 1.0;
                }
            }
        }

        let n_trees = self.trees.len().max(1) as f64;
        votes.mapv_inplace(|v| v / n_trees);
        Ok(votes)
    }

    /// Mean impurity-based importance per feature column, summing to 1
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for member in &self.trees {
            for (local, value) in member.tree.feature_importance().into_iter().enumerate() {
                // single-leaf trees report NaN
                if let (Some(&column), true) = (member.features.get(local), value.is_finite()) {
                    totals[column] += value;
                }
            }
        }

        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }
}
