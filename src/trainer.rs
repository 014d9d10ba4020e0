//! Model trainer
//!
//! Cleaned dataset in, linked model + encoder artifacts out. Rows that still
//! fail numeric coercion and finishing positions with too few rows for a
//! stratified split are excluded rather than aborting the run.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::data::features::{column_medians, to_matrix};
use crate::data::normalize::coerce_u32;
use crate::data::{
    Dataset, EncoderRegistry, EncoderRegistryBuilder, FeatureKind, FeaturePlan, FeatureValue,
    FieldNormalizer,
};
use crate::error::{PipelineError, Result};
use crate::model::{
    evaluate, rank_importances, stratified_split, Classifier, ClassificationReport, ForestParams,
    ModelStore, RandomForest, TrainedModel,
};
use crate::models::Column;

/// Training settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingOptions {
    pub categorical_columns: Vec<String>,
    pub label_column: String,
    pub test_fraction: f64,
    /// Finishing positions with fewer rows are dropped
    pub min_class_size: usize,
    #[serde(flatten)]
    pub forest: ForestParams,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            categorical_columns: [
                Column::RaceName,
                Column::Weather,
                Column::Jockey,
                Column::TrackCondition,
            ]
            .iter()
            .map(|c| c.header().to_string())
            .collect(),
            label_column: Column::FinishPosition.header().to_string(),
            test_fraction: 0.2,
            min_class_size: 2,
            forest: ForestParams::default(),
        }
    }
}

/// Counts and diagnostics from one training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub model_id: Uuid,
    pub rows_read: usize,
    pub dropped_uncoercible: usize,
    pub dropped_rare_class: usize,
    pub rows_used: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub classes: Vec<u32>,
    pub report: ClassificationReport,
    /// Feature name and importance, most important first
    pub importances: Vec<(String, f64)>,
}

/// One coerced training row
struct Sample {
    values: Vec<FeatureValue>,
    label: u32,
}

pub struct Trainer {
    options: TrainingOptions,
    normalizer: FieldNormalizer,
}

impl Trainer {
    pub fn new(options: TrainingOptions) -> Self {
        Self {
            options,
            normalizer: FieldNormalizer::new(),
        }
    }

    pub fn options(&self) -> &TrainingOptions {
        &self.options
    }

    /// Read `input`, train, and save the artifact pair into `store`
    pub fn train_file<P: AsRef<Path>>(&self, input: P, store: &ModelStore) -> Result<TrainingSummary> {
        let dataset = Dataset::read_csv(input.as_ref())?;
        let (model, encoders, summary) = self.train(&dataset)?;
        store.save(&model, &encoders)?;
        Ok(summary)
    }

    pub fn train(&self, dataset: &Dataset) -> Result<(TrainedModel, EncoderRegistry, TrainingSummary)> {
        let opts = &self.options;
        let plan = FeaturePlan::from_columns(
            dataset.columns(),
            &opts.categorical_columns,
            &opts.label_column,
        );
        let label_idx = plan.label_index().ok_or_else(|| PipelineError::SchemaMismatch {
            missing: vec![opts.label_column.clone()],
        })?;
        if plan.features().is_empty() {
            return Err(PipelineError::EmptyTrainingSet(
                "dataset has no feature columns".to_string(),
            ));
        }
        info!("Read {} rows", dataset.len());

        // Coercion
        let mut samples: Vec<Sample> = Vec::with_capacity(dataset.len());
        for row in dataset.rows() {
            if let Some(sample) = self.coerce_row(&plan, row, label_idx) {
                samples.push(sample);
            }
        }
        let dropped_uncoercible = dataset.len() - samples.len();
        info!("Dropped {} rows that failed numeric coercion", dropped_uncoercible);

        // Rare classes cannot be stratified
        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for s in &samples {
            *counts.entry(s.label).or_default() += 1;
        }
        let before_filter = samples.len();
        samples.retain(|s| counts[&s.label] >= opts.min_class_size);
        let dropped_rare_class = before_filter - samples.len();
        info!(
            "Dropped {} rows of finishing positions with fewer than {} rows",
            dropped_rare_class, opts.min_class_size
        );

        if samples.is_empty() {
            return Err(PipelineError::EmptyTrainingSet(format!(
                "all {} rows were excluded",
                dataset.len()
            )));
        }

        // Encoders
        let model_id = Uuid::new_v4();
        let mut builder = EncoderRegistryBuilder::new();
        for spec in plan.features() {
            if spec.kind == FeatureKind::Categorical {
                builder.column(&spec.name);
            }
        }
        for s in &samples {
            for (spec, value) in plan.features().iter().zip(&s.values) {
                if let FeatureValue::Category(text) = value {
                    builder.observe(&spec.name, text);
                }
            }
        }
        let encoders = builder.build(model_id);
        for field in encoders.fields() {
            let n = encoders.encoder(field).map(|e| e.classes().len()).unwrap_or(0);
            info!("Encoded {} ({} categories)", field, n);
        }

        let width = plan.features().len();
        let rows: Vec<Vec<f64>> = samples
            .iter()
            .map(|s| {
                plan.encode_row(&s.values, &encoders)
                    .into_iter()
                    .map(|v| v.unwrap_or_default())
                    .collect()
            })
            .collect();
        let labels: Vec<u32> = samples.iter().map(|s| s.label).collect();
        info!("Final training set: {} rows x {} features", rows.len(), width);

        // Split, fit, evaluate
        let split = stratified_split(&labels, opts.test_fraction, opts.forest.seed);
        info!("Train: {} rows, test: {} rows", split.train.len(), split.test.len());

        let pick = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<u32>) {
            (
                idx.iter().map(|&i| rows[i].clone()).collect(),
                idx.iter().map(|&i| labels[i]).collect(),
            )
        };
        let (train_rows, train_labels) = pick(&split.train);
        let (test_rows, test_labels) = pick(&split.test);

        let forest = RandomForest::fit(&to_matrix(&train_rows, width)?, &train_labels, &opts.forest)?;
        if forest.classes().len() < 2 {
            warn!("Only one finishing position left to learn: {:?}", forest.classes());
        }

        let present: Vec<Vec<Option<f64>>> = rows
            .iter()
            .map(|r| r.iter().map(|&v| Some(v)).collect())
            .collect();
        let medians: Vec<f64> = column_medians(&present, width)
            .into_iter()
            .map(|m| m.unwrap_or_default())
            .collect();

        let model = TrainedModel {
            model_id,
            trained_at: Utc::now(),
            feature_names: plan.names(),
            feature_medians: medians,
            forest,
        };

        let predicted = model.predict(&to_matrix(&test_rows, width)?)?;
        let report = evaluate(&test_labels, &predicted, model.classes());
        info!("Accuracy: {:.4}", report.accuracy);

        let importances = rank_importances(&model.feature_names, &model.forest.feature_importances());

        let summary = TrainingSummary {
            model_id,
            rows_read: dataset.len(),
            dropped_uncoercible,
            dropped_rare_class,
            rows_used: samples.len(),
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            classes: model.classes().to_vec(),
            report,
            importances,
        };

        Ok((model, encoders, summary))
    }

    /// Coerce a row; `None` when the label or any feature is unusable
    fn coerce_row(&self, plan: &FeaturePlan, row: &[String], label_idx: usize) -> Option<Sample> {
        let label = row
            .get(label_idx)
            .and_then(|t| coerce_u32(t))
            .filter(|&l| l >= 1)?;

        let values = plan.read_row(row, &self.normalizer);
        let usable = values.iter().all(|v| match v {
            FeatureValue::Number(n) => n.is_some(),
            FeatureValue::Category(text) => !text.is_empty(),
        });

        usable.then_some(Sample { values, label })
    }
}
