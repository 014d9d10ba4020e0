//! Keiba - netkeiba race data pipeline
//!
//! This library provides:
//! - Scraping of horse past-performance tables and race cards
//! - An append-only race result dataset and its cleaning pass
//! - Categorical encoding shared between training and prediction
//! - A random forest finishing-position classifier
//! - Ranked finishing-position predictions for an entry list
//!
//! # Example
//!
//! ```no_run
//! use keiba::model::ModelStore;
//! use keiba::models::PredictionMode;
//! use keiba::predictor::{Imputation, Predictor};
//!
//! let store = ModelStore::new(".");
//! let predictor = Predictor::load(&store, Imputation::BatchMedian)?;
//! let outcome = predictor.predict_file("predict_data_有馬記念.csv", PredictionMode::Expected)?;
//! for (rank, horse) in outcome.ranking.iter().enumerate() {
//!     println!("{}. {} {:.2}", rank + 1, horse.horse_name, horse.value);
//! }
//! # Ok::<(), keiba::error::PipelineError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod models;
pub mod predictor;
pub mod scraper;
pub mod trainer;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use data::{Dataset, DatasetWriter, EncoderRegistry};
pub use error::{PipelineError, Result};
pub use model::{Classifier, ModelStore, TrainedModel};
pub use models::{Column, PredictionMode, RaceContext, RaceRecord, RankedPrediction};
pub use predictor::{Imputation, PredictionOutcome, Predictor};
pub use trainer::{Trainer, TrainingOptions, TrainingSummary};
