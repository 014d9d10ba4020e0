//! Model artifact storage
//!
//! The classifier and the encoder registry are written and read as one pair.
//! Both carry the training run's `model_id`; a pair whose ids differ is
//! refused.

use std::path::{Path, PathBuf};
use tracing::info;

use super::TrainedModel;
use crate::data::EncoderRegistry;
use crate::error::{require_artifact, PipelineError, Result};

pub const MODEL_FILE: &str = "random_forest_model.json";
pub const ENCODERS_FILE: &str = "label_encoders.json";

pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn encoders_path(&self) -> PathBuf {
        self.dir.join(ENCODERS_FILE)
    }

    pub fn save(&self, model: &TrainedModel, encoders: &EncoderRegistry) -> Result<()> {
        if model.model_id != encoders.model_id() {
            return Err(PipelineError::ArtifactMismatch {
                model: model.model_id,
                encoders: encoders.model_id(),
            });
        }

        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.model_path(), serde_json::to_string(model)?)?;
        encoders.save(self.encoders_path())?;

        info!("Saved model {} to {:?}", model.model_id, self.model_path());
        Ok(())
    }

    /// Load both artifacts; either one missing is `MissingArtifact`
    pub fn load(&self) -> Result<(TrainedModel, EncoderRegistry)> {
        let model_path = self.model_path();
        require_artifact(&model_path)?;
        require_artifact(&self.encoders_path())?;

        let model: TrainedModel = serde_json::from_str(&std::fs::read_to_string(&model_path)?)?;
        let encoders = EncoderRegistry::load(self.encoders_path())?;

        if model.model_id != encoders.model_id() {
            return Err(PipelineError::ArtifactMismatch {
                model: model.model_id,
                encoders: encoders.model_id(),
            });
        }
        if model.feature_names.len() != model.forest.n_features() {
            return Err(PipelineError::InvalidArtifact(format!(
                "{} feature names for a model with {} features",
                model.feature_names.len(),
                model.forest.n_features()
            )));
        }

        info!(
            "Loaded model {} (trained {}, {} features, classes {:?})",
            model.model_id,
            model.trained_at.format("%Y-%m-%d %H:%M"),
            model.feature_names.len(),
            model.forest.classes()
        );
        Ok((model, encoders))
    }
}
