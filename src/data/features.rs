//! Feature Engineering
//!
//! Maps dataset columns to model features. The same plan drives training and
//! prediction, so both sides coerce and encode cells identically.

use ndarray::Array2;
use tracing::warn;

use crate::data::encoder::EncoderRegistry;
use crate::data::normalize::FieldNormalizer;
use crate::error::{PipelineError, Result};
use crate::models::Column;

/// How a feature column is turned into a number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Encoded through the registry
    Categorical,
    /// Coerced directly; the known column (if any) selects its text convention
    Numeric(Option<Column>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpec {
    pub name: String,
    /// Index of the source column in the dataset
    pub source: usize,
    pub kind: FeatureKind,
}

/// A single cell read through a feature spec
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Category(String),
    /// `None` when the text could not be coerced
    Number(Option<f64>),
}

impl FeatureValue {
    /// Numeric value after encoding categories
    pub fn encode(&self, field: &str, registry: &EncoderRegistry) -> Option<f64> {
        match self {
            FeatureValue::Category(text) => Some(registry.encode(field, text) as f64),
            FeatureValue::Number(v) => *v,
        }
    }
}

/// Ordered feature columns plus the label and identifier positions
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePlan {
    features: Vec<FeatureSpec>,
    label: Option<usize>,
    horse_name: Option<usize>,
}

impl FeaturePlan {
    /// Classify dataset columns: label, horse name, categorical or numeric
    pub fn from_columns(columns: &[String], categorical: &[String], label: &str) -> Self {
        let mut features = Vec::new();
        let mut label_idx = None;
        let mut horse_name = None;

        for (source, name) in columns.iter().enumerate() {
            let name = name.trim_start_matches('\u{feff}').trim();
            if name == label {
                label_idx = Some(source);
                continue;
            }
            if name == Column::HorseName.header() {
                horse_name = Some(source);
                continue;
            }

            let kind = if categorical.iter().any(|c| c == name) {
                FeatureKind::Categorical
            } else {
                FeatureKind::Numeric(Column::from_header(name))
            };
            features.push(FeatureSpec {
                name: name.to_string(),
                source,
                kind,
            });
        }

        Self {
            features,
            label: label_idx,
            horse_name,
        }
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn label_index(&self) -> Option<usize> {
        self.label
    }

    pub fn horse_name_index(&self) -> Option<usize> {
        self.horse_name
    }

    /// Reorder features to exactly `trained`
    ///
    /// A trained name absent here is a schema mismatch; columns not used by
    /// the model are dropped with a warning.
    pub fn align_to(&self, trained: &[String]) -> Result<FeaturePlan> {
        let missing: Vec<String> = trained
            .iter()
            .filter(|name| !self.features.iter().any(|f| &f.name == *name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::SchemaMismatch { missing });
        }

        for extra in self.features.iter().filter(|f| !trained.contains(&f.name)) {
            warn!("Ignoring column not used by the model: {}", extra.name);
        }

        let features = trained
            .iter()
            .filter_map(|name| self.features.iter().find(|f| &f.name == name).cloned())
            .collect();

        Ok(FeaturePlan {
            features,
            label: self.label,
            horse_name: self.horse_name,
        })
    }

    /// Read one dataset row through the plan
    pub fn read_row(&self, row: &[String], normalizer: &FieldNormalizer) -> Vec<FeatureValue> {
        self.features
            .iter()
            .map(|spec| {
                let text = row.get(spec.source).map(String::as_str).unwrap_or("");
                match spec.kind {
                    FeatureKind::Categorical => FeatureValue::Category(text.trim().to_string()),
                    FeatureKind::Numeric(column) => {
                        FeatureValue::Number(normalizer.coerce_cell(column, text))
                    }
                }
            })
            .collect()
    }

    /// Encode a read row; `None` marks a cell that still needs a value
    pub fn encode_row(&self, values: &[FeatureValue], registry: &EncoderRegistry) -> Vec<Option<f64>> {
        self.features
            .iter()
            .zip(values)
            .map(|(spec, value)| value.encode(&spec.name, registry))
            .collect()
    }
}

/// Median of the values (mean of the middle two for even counts)
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Per-column medians of the present values
pub fn column_medians(rows: &[Vec<Option<f64>>], width: usize) -> Vec<Option<f64>> {
    (0..width)
        .map(|j| {
            let present: Vec<f64> = rows.iter().filter_map(|r| r.get(j).copied().flatten()).collect();
            median(&present)
        })
        .collect()
}

/// Dense row-major feature matrix
pub fn to_matrix(rows: &[Vec<f64>], width: usize) -> Result<Array2<f64>> {
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Array2::from_shape_vec((rows.len(), width), flat)
        .map_err(|e| PipelineError::Model(format!("feature matrix shape: {}", e)))
}
