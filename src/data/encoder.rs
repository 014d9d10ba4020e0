//! Category encoder registry
//!
//! One encoder per categorical column, fitted on the training data. Codes are
//! the index of the value in the sorted list of observed values, so the same
//! training data always produces the same codes. Values never seen during
//! training map to [`UNSEEN_CODE`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{require_artifact, PipelineError, Result};

/// Code for a category value absent from training
pub const UNSEEN_CODE: i64 = -1;

/// Sorted category values of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    classes: Vec<String>,
}

impl CategoryEncoder {
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Code of a seen value
    pub fn code_of(&self, value: &str) -> Option<i64> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
            .map(|i| i as i64)
    }

    /// Code of a value, or [`UNSEEN_CODE`]
    pub fn encode(&self, value: &str) -> i64 {
        self.code_of(value).unwrap_or(UNSEEN_CODE)
    }

    pub fn decode(&self, code: i64) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.classes.get(i))
            .map(String::as_str)
    }

    fn is_sorted_unique(&self) -> bool {
        self.classes.windows(2).all(|w| w[0] < w[1])
    }
}

/// Collects observed values while the training set is scanned
#[derive(Debug, Default)]
pub struct EncoderRegistryBuilder {
    observed: BTreeMap<String, BTreeSet<String>>,
}

impl EncoderRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a column even if no value is ever observed for it
    pub fn column(&mut self, field: &str) -> &mut Self {
        self.observed.entry(field.to_string()).or_default();
        self
    }

    pub fn observe(&mut self, field: &str, value: &str) -> &mut Self {
        self.observed
            .entry(field.to_string())
            .or_default()
            .insert(value.to_string());
        self
    }

    pub fn build(self, model_id: Uuid) -> EncoderRegistry {
        let encoders = self
            .observed
            .into_iter()
            .map(|(field, values)| {
                (
                    field,
                    CategoryEncoder {
                        classes: values.into_iter().collect(),
                    },
                )
            })
            .collect();

        EncoderRegistry { model_id, encoders }
    }
}

/// Frozen encoders for every categorical column, tied to one trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderRegistry {
    model_id: Uuid,
    encoders: BTreeMap<String, CategoryEncoder>,
}

impl EncoderRegistry {
    pub fn model_id(&self) -> Uuid {
        self.model_id
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.encoders.keys().map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.encoders.contains_key(field)
    }

    pub fn encoder(&self, field: &str) -> Option<&CategoryEncoder> {
        self.encoders.get(field)
    }

    /// Code for `value` in `field`; unknown fields and unseen values give
    /// [`UNSEEN_CODE`]
    pub fn encode(&self, field: &str, value: &str) -> i64 {
        self.encoders
            .get(field)
            .map(|e| e.encode(value))
            .unwrap_or(UNSEEN_CODE)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        info!(
            "Saved {} category encoders to {:?}",
            self.encoders.len(),
            path.as_ref()
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        require_artifact(path)?;

        let registry: EncoderRegistry = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        if let Some((field, _)) = registry
            .encoders
            .iter()
            .find(|(_, e)| !e.is_sorted_unique())
        {
            return Err(PipelineError::InvalidArtifact(format!(
                "encoder for {} is not sorted",
                field
            )));
        }

        for (field, encoder) in &registry.encoders {
            if encoder.classes.is_empty() {
                warn!("Encoder for {} has no categories", field);
            }
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::temp_path;

    fn registry() -> EncoderRegistry {
        let mut builder = EncoderRegistryBuilder::new();
        for jockey in ["武豊", "ルメール", "川田将雅", "武豊"] {
            builder.observe("騎手", jockey);
        }
        builder.observe("天気", "晴").observe("天気", "曇");
        builder.build(Uuid::new_v4())
    }

    #[test]
    fn test_codes_follow_sorted_order() {
        let registry = registry();
        let jockeys = registry.encoder("騎手").unwrap();
        assert_eq!(jockeys.classes().len(), 3);

        let mut sorted = jockeys.classes().to_vec();
        sorted.sort();
        assert_eq!(jockeys.classes(), sorted.as_slice());

        for (i, value) in sorted.iter().enumerate() {
            assert_eq!(registry.encode("騎手", value), i as i64);
            assert_eq!(jockeys.decode(i as i64), Some(value.as_str()));
        }
    }

    #[test]
    fn test_same_input_same_codes() {
        let a = registry();
        let b = registry();
        for value in ["武豊", "ルメール", "川田将雅"] {
            assert_eq!(a.encode("騎手", value), b.encode("騎手", value));
        }
    }

    #[test]
    fn test_unseen_value_and_field() {
        let registry = registry();
        assert_eq!(registry.encode("騎手", "新人騎手"), UNSEEN_CODE);
        assert_eq!(registry.encode("馬場", "良"), UNSEEN_CODE);
        assert_eq!(registry.encoder("天気").unwrap().decode(UNSEEN_CODE), None);
    }

    #[test]
    fn test_save_load() {
        let path = temp_path("label_encoders.json");
        let registry = registry();
        registry.save(&path).unwrap();

        let loaded = EncoderRegistry::load(&path).unwrap();
        assert_eq!(loaded, registry);
        assert_eq!(loaded.model_id(), registry.model_id());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_rejects_unsorted_classes() {
        let path = temp_path("bad_encoders.json");
        let json = format!(
            r#"{{"model_id":"{}","encoders":{{"天気":{{"classes":["雨","晴"]}}}}}}"#,
            Uuid::new_v4()
        );
        std::fs::write(&path, json).unwrap();

        let err = EncoderRegistry::load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArtifact(_)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing_artifact() {
        let err = EncoderRegistry::load("/nowhere/label_encoders.json").unwrap_err();
        assert!(matches!(err, PipelineError::MissingArtifact(_)));
    }
}
