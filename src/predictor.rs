//! Finishing-position predictor
//!
//! Scores an entry list with a trained model and its encoder registry.
//! Prediction never drops a horse: cells that cannot be coerced are filled
//! with a median and unseen categories get the sentinel code.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::data::features::{column_medians, to_matrix};
use crate::data::{Dataset, EncoderRegistry, FeatureKind, FeaturePlan, FeatureValue, FieldNormalizer};
use crate::error::Result;
use crate::model::{Classifier, ModelStore, TrainedModel};
use crate::models::{Column, PredictionMode, RankedPrediction};

/// Where a missing feature value is taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Imputation {
    /// Median of the column within the batch being predicted
    #[default]
    BatchMedian,
    /// Median of the column in the training data
    TrainingMedian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MedianSource {
    Batch,
    Training,
    /// Neither median was available
    Zero,
}

/// One imputed feature column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImputedColumn {
    pub feature: String,
    pub cells: usize,
    pub value: f64,
    pub source: MedianSource,
}

/// One categorical column encoded with the saved categories
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedColumn {
    pub feature: String,
    /// Cells whose value was not seen during training
    pub unseen: usize,
}

/// Ranking plus what had to be filled in to produce it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionOutcome {
    pub mode: PredictionMode,
    /// Ascending by predicted value; ties keep entry-list order
    pub ranking: Vec<RankedPrediction>,
    pub imputed: Vec<ImputedColumn>,
    pub encoded: Vec<EncodedColumn>,
}

pub struct Predictor<M: Classifier = TrainedModel> {
    model: M,
    encoders: EncoderRegistry,
    imputation: Imputation,
    normalizer: FieldNormalizer,
}

impl Predictor<TrainedModel> {
    /// Load the artifact pair from `store`
    pub fn load(store: &ModelStore, imputation: Imputation) -> Result<Self> {
        let (model, encoders) = store.load()?;
        Ok(Self::new(model, encoders, imputation))
    }
}

impl<M: Classifier> Predictor<M> {
    pub fn new(model: M, encoders: EncoderRegistry, imputation: Imputation) -> Self {
        Self {
            model,
            encoders,
            imputation,
            normalizer: FieldNormalizer::new(),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn predict_file<P: AsRef<Path>>(&self, path: P, mode: PredictionMode) -> Result<PredictionOutcome> {
        let dataset = Dataset::read_csv(path.as_ref())?;
        self.predict(&dataset, mode)
    }

    pub fn predict(&self, dataset: &Dataset, mode: PredictionMode) -> Result<PredictionOutcome> {
        let categorical: Vec<String> = self.encoders.fields().map(String::from).collect();
        let plan = FeaturePlan::from_columns(
            dataset.columns(),
            &categorical,
            Column::FinishPosition.header(),
        )
        .align_to(self.model.feature_names())?;
        info!("Feature columns aligned to the trained order");

        let values: Vec<Vec<FeatureValue>> = dataset
            .rows()
            .iter()
            .map(|row| plan.read_row(row, &self.normalizer))
            .collect();

        let encoded = self.encoded_columns(&plan, &values);
        let mut cells: Vec<Vec<Option<f64>>> = values
            .iter()
            .map(|v| plan.encode_row(v, &self.encoders))
            .collect();
        let imputed = self.impute(&plan, &mut cells);

        let width = plan.features().len();
        let rows: Vec<Vec<f64>> = cells
            .into_iter()
            .map(|r| r.into_iter().map(|v| v.unwrap_or_default()).collect())
            .collect();
        let x = to_matrix(&rows, width)?;

        let scores: Vec<f64> = match mode {
            PredictionMode::Class => self.model.predict(&x)?.into_iter().map(f64::from).collect(),
            PredictionMode::Expected => {
                expected_positions(&self.model.predict_proba(&x)?, self.model.classes())
            }
        };

        let mut ranking: Vec<RankedPrediction> = scores
            .into_iter()
            .enumerate()
            .map(|(i, value)| RankedPrediction {
                horse_name: horse_name(dataset, plan.horse_name_index(), i),
                value,
            })
            .collect();
        ranking.sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(std::cmp::Ordering::Equal));
        info!("Predicted {} horses", ranking.len());

        Ok(PredictionOutcome {
            mode,
            ranking,
            imputed,
            encoded,
        })
    }

    fn encoded_columns(&self, plan: &FeaturePlan, values: &[Vec<FeatureValue>]) -> Vec<EncodedColumn> {
        let mut encoded = Vec::new();
        for (j, spec) in plan.features().iter().enumerate() {
            if spec.kind != FeatureKind::Categorical {
                continue;
            }
            let known = self.encoders.encoder(&spec.name);
            let unseen = values
                .iter()
                .filter(|row| match (row.get(j), known) {
                    (Some(FeatureValue::Category(text)), Some(enc)) => enc.code_of(text).is_none(),
                    _ => true,
                })
                .count();
            info!("Encoded {} with the saved categories ({} unseen)", spec.name, unseen);
            encoded.push(EncodedColumn {
                feature: spec.name.clone(),
                unseen,
            });
        }
        encoded
    }

    /// Fill `None` cells column by column
    fn impute(&self, plan: &FeaturePlan, cells: &mut [Vec<Option<f64>>]) -> Vec<ImputedColumn> {
        let width = plan.features().len();
        let batch = column_medians(cells, width);
        let training = self.model.feature_medians();
        let mut imputed = Vec::new();

        for (j, spec) in plan.features().iter().enumerate() {
            let missing = cells.iter().filter(|r| r.get(j).copied().flatten().is_none()).count();
            if missing == 0 {
                continue;
            }

            let from_batch = batch[j].map(|v| (v, MedianSource::Batch));
            let from_training = training
                .and_then(|m| m.get(j).copied())
                .map(|v| (v, MedianSource::Training));
            let chosen = match self.imputation {
                Imputation::BatchMedian => from_batch.or(from_training),
                Imputation::TrainingMedian => from_training.or(from_batch),
            };
            let (value, source) = chosen.unwrap_or_else(|| {
                warn!("No median available for {}; filling {} cells with 0", spec.name, missing);
                (0.0, MedianSource::Zero)
            });

            for row in cells.iter_mut() {
                if let Some(cell) = row.get_mut(j) {
                    if cell.is_none() {
                        *cell = Some(value);
                    }
                }
            }
            info!(
                "Filled {} missing {} values with the {:?} median ({})",
                missing, spec.name, source, value
            );
            imputed.push(ImputedColumn {
                feature: spec.name.clone(),
                cells: missing,
                value,
                source,
            });
        }
        imputed
    }
}

/// Probability-weighted finishing position per row
pub fn expected_positions(proba: &Array2<f64>, classes: &[u32]) -> Vec<f64> {
    proba
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .zip(classes)
                .map(|(p, &label)| p * label as f64)
                .sum()
        })
        .collect()
}

fn horse_name(dataset: &Dataset, column: Option<usize>, row: usize) -> String {
    column
        .and_then(|c| dataset.cell(row, c))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .unwrap_or_else(|| format!("#{}", row + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EncoderRegistryBuilder;
    use crate::error::PipelineError;
    use crate::trainer::tests::training_dataset;
    use crate::trainer::{Trainer, TrainingOptions};
    use crate::model::ForestParams;
    use ndarray::array;
    use uuid::Uuid;

    /// Scores rows by their first feature so the ranking is predictable
    struct ByFirstFeature {
        names: Vec<String>,
        medians: Option<Vec<f64>>,
    }

    impl Classifier for ByFirstFeature {
        fn classes(&self) -> &[u32] {
            &[1, 2, 3]
        }

        fn feature_names(&self) -> &[String] {
            &self.names
        }

        fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
            let mut proba = Array2::zeros((x.nrows(), 3));
            for (i, row) in x.rows().into_iter().enumerate() {
                let col = (row[0].max(0.0) as usize).min(2);
                proba[[i, col]] = 1.0;
            }
            Ok(proba)
        }

        fn feature_medians(&self) -> Option<&[f64]> {
            self.medians.as_deref()
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn stub_predictor(imputation: Imputation, medians: Option<Vec<f64>>) -> Predictor<ByFirstFeature> {
        let mut builder = EncoderRegistryBuilder::new();
        builder.observe("騎手", "武豊").observe("騎手", "ルメール");
        let model = ByFirstFeature {
            names: strings(&["人気", "騎手", "オッズ"]),
            medians,
        };
        Predictor::new(model, builder.build(Uuid::new_v4()), imputation)
    }

    fn entries(rows: &[[&str; 4]]) -> Dataset {
        let mut dataset = Dataset::new(strings(&["馬名", "オッズ", "騎手", "人気"]));
        for row in rows {
            dataset.push_row(strings(row));
        }
        dataset
    }

    #[test]
    fn test_expected_value_is_probability_weighted() {
        let values = expected_positions(&array![[0.5, 0.3, 0.2]], &[1, 2, 3]);
        assert!((values[0] - 1.7).abs() < 1e-9);
    }

    #[test]
    fn test_ranking_is_ascending_and_keeps_every_row() {
        let predictor = stub_predictor(Imputation::BatchMedian, None);
        let dataset = entries(&[
            ["アオ", "10.0", "武豊", "2"],
            ["アカ", "2.0", "ルメール", "0"],
            ["シロ", "5.0", "新人騎手", "1"],
        ]);

        let outcome = predictor.predict(&dataset, PredictionMode::Class).unwrap();
        let names: Vec<&str> = outcome.ranking.iter().map(|r| r.horse_name.as_str()).collect();
        assert_eq!(names, vec!["アカ", "シロ", "アオ"]);
        assert_eq!(
            outcome.ranking.iter().map(|r| r.value).collect::<Vec<_>>(),
            vec![1.0, 2.0, 3.0]
        );
        assert_eq!(outcome.encoded.len(), 1);
        assert_eq!(outcome.encoded[0].unseen, 1);
        assert!(outcome.imputed.is_empty());
    }

    #[test]
    fn test_missing_trained_feature_is_fatal() {
        let predictor = stub_predictor(Imputation::BatchMedian, None);
        let mut dataset = Dataset::new(strings(&["馬名", "オッズ", "騎手"]));
        dataset.push_row(strings(&["アオ", "3.0", "武豊"]));

        match predictor.predict(&dataset, PredictionMode::Class) {
            Err(PipelineError::SchemaMismatch { missing }) => assert_eq!(missing, vec!["人気"]),
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_batch_median_imputation() {
        let predictor = stub_predictor(Imputation::BatchMedian, Some(vec![0.0, 0.0, 99.0]));
        let dataset = entries(&[
            ["アオ", "2.0", "武豊", "0"],
            ["アカ", "---", "武豊", "1"],
            ["シロ", "6.0", "武豊", "2"],
        ]);

        let outcome = predictor.predict(&dataset, PredictionMode::Class).unwrap();
        assert_eq!(outcome.imputed.len(), 1);
        let odds = &outcome.imputed[0];
        assert_eq!(odds.feature, "オッズ");
        assert_eq!(odds.cells, 1);
        assert_eq!(odds.value, 4.0);
        assert_eq!(odds.source, MedianSource::Batch);
        assert_eq!(outcome.ranking.len(), 3);
    }

    #[test]
    fn test_training_median_imputation() {
        let predictor = stub_predictor(Imputation::TrainingMedian, Some(vec![1.0, 0.0, 99.0]));
        let dataset = entries(&[["アオ", "2.0", "武豊", ""], ["アカ", "", "武豊", "0"]]);

        let outcome = predictor.predict(&dataset, PredictionMode::Class).unwrap();
        let by_name: Vec<(&str, f64, MedianSource)> = outcome
            .imputed
            .iter()
            .map(|c| (c.feature.as_str(), c.value, c.source))
            .collect();
        assert_eq!(
            by_name,
            vec![("人気", 1.0, MedianSource::Training), ("オッズ", 99.0, MedianSource::Training)]
        );
    }

    #[test]
    fn test_fully_missing_column_falls_back() {
        let dataset = entries(&[["アオ", "", "武豊", "0"], ["アカ", "", "武豊", "1"]]);

        let with_training = stub_predictor(Imputation::BatchMedian, Some(vec![0.0, 0.0, 7.5]));
        let outcome = with_training.predict(&dataset, PredictionMode::Class).unwrap();
        assert_eq!(outcome.imputed[0].value, 7.5);
        assert_eq!(outcome.imputed[0].source, MedianSource::Training);

        let without = stub_predictor(Imputation::BatchMedian, None);
        let outcome = without.predict(&dataset, PredictionMode::Class).unwrap();
        assert_eq!(outcome.imputed[0].value, 0.0);
        assert_eq!(outcome.imputed[0].source, MedianSource::Zero);
    }

    #[test]
    fn test_unnamed_horses_are_numbered() {
        let predictor = stub_predictor(Imputation::BatchMedian, None);
        let mut dataset = Dataset::new(strings(&["オッズ", "騎手", "人気"]));
        dataset.push_row(strings(&["3.0", "武豊", "1"]));
        dataset.push_row(strings(&["4.0", "武豊", "0"]));

        let outcome = predictor.predict(&dataset, PredictionMode::Expected).unwrap();
        assert_eq!(outcome.ranking[0].horse_name, "#2");
        assert_eq!(outcome.ranking[1].horse_name, "#1");
    }

    #[test]
    fn test_trained_model_scores_entry_list_with_unseen_jockey() {
        let options = TrainingOptions {
            forest: ForestParams {
                n_trees: 15,
                ..ForestParams::default()
            },
            ..TrainingOptions::default()
        };
        let (model, encoders, _) = Trainer::new(options).train(&training_dataset(90)).unwrap();
        let predictor = Predictor::new(model, encoders, Imputation::BatchMedian);

        let mut dataset = Dataset::new(Column::headers(&Column::ENTRY_ORDER));
        for (name, odds, jockey) in [
            ("ロングショット", "9.2", "武豊"),
            ("フェイバリット", "3.1", "見習い騎手"),
            ("ミドル", "6.0", "ルメール"),
        ] {
            dataset.push_row(strings(&[
                "レース1", "晴", "11R", "16", "良", name, "1", "2", odds, "3", jockey, "57",
                "480", "+2",
            ]));
        }

        for mode in [PredictionMode::Class, PredictionMode::Expected] {
            let outcome = predictor.predict(&dataset, mode).unwrap();
            assert_eq!(outcome.ranking.len(), 3);
            for pair in outcome.ranking.windows(2) {
                assert!(pair[0].value <= pair[1].value);
            }
            let jockey = outcome.encoded.iter().find(|c| c.feature == "騎手").unwrap();
            assert_eq!(jockey.unseen, 1);
        }
    }

    #[test]
    fn test_predict_file_missing_input() {
        let predictor = stub_predictor(Imputation::BatchMedian, None);
        let err = predictor
            .predict_file("/no/such/predict_data_race.csv", PredictionMode::Class)
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingFile(_)));
    }
}
