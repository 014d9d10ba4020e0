//! Finishing-position classifier and its persisted form

pub mod forest;
pub mod metrics;
pub mod split;
pub mod store;

pub use forest::{ForestParams, MaxFeatures, RandomForest};
pub use metrics::{evaluate, rank_importances, ClassMetrics, ClassificationReport};
pub use split::{stratified_split, Split};
pub use store::ModelStore;

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// What the predictor needs from a fitted model
pub trait Classifier {
    /// Labels in probability-column order
    fn classes(&self) -> &[u32];

    /// Feature names in the column order used at fit time
    fn feature_names(&self) -> &[String];

    /// Class probabilities, one row per input row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Most probable class per row (ties go to the lower label)
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<u32>> {
        let proba = self.predict_proba(x)?;
        let classes = self.classes();
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| {
                let mut best = 0;
                for (i, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = i;
                    }
                }
                classes.get(best).copied().unwrap_or_default()
            })
            .collect())
    }

    /// Per-feature medians of the training data, when retained
    fn feature_medians(&self) -> Option<&[f64]> {
        None
    }
}

/// Fitted forest plus everything needed to score new rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    /// Shared with the encoder registry trained alongside
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub feature_medians: Vec<f64>,
    pub forest: RandomForest,
}

impl Classifier for TrainedModel {
    fn classes(&self) -> &[u32] {
        self.forest.classes()
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.forest.predict_proba(x)
    }

    fn feature_medians(&self) -> Option<&[f64]> {
        if self.feature_medians.len() == self.feature_names.len() {
            Some(&self.feature_medians)
        } else {
            None
        }
    }
}
