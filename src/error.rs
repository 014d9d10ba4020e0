//! Error types for the dataset, training and prediction pipeline

use polars::prelude::PolarsError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Pipeline error types
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Required input file (training data, entry list, URL list) does not exist
    #[error("File not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// Model or encoder artifact does not exist
    #[error("Model artifact not found: {}. Run `keiba train` first.", .0.display())]
    MissingArtifact(PathBuf),

    /// Model and encoder registry were not produced by the same training run
    #[error("Model {model} and encoder registry {encoders} were not trained together")]
    ArtifactMismatch { model: Uuid, encoders: Uuid },

    /// Prediction features do not line up with the trained feature order
    #[error("Feature columns do not match the trained model; missing: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// Existing dataset file has a header different from the one being appended
    #[error("Header of {} does not match the expected columns", .path.display())]
    HeaderMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Nothing left to fit after coercion and filtering
    #[error("No usable training rows: {0}")]
    EmptyTrainingSet(String),

    /// Artifact content is structurally invalid
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    /// Classifier fit or inference failure
    #[error("Model error: {0}")]
    Model(String),

    #[error("CSV error: {0}")]
    Csv(#[from] PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Fail with `MissingFile` unless `path` exists
pub fn require_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(PipelineError::MissingFile(path.to_path_buf()));
    }
    Ok(())
}

/// Fail with `MissingArtifact` unless `path` exists
pub fn require_artifact(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(PipelineError::MissingArtifact(path.to_path_buf()));
    }
    Ok(())
}

impl PipelineError {
    /// Whether the error means "no such input", as opposed to bad content
    pub fn is_missing_input(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingFile(_) | PipelineError::MissingArtifact(_)
        )
    }
}
