//! Dataset construction, cleaning and feature encoding

pub mod assembler;
pub mod cleaner;
pub mod dataset;
pub mod encoder;
pub mod features;
pub mod normalize;

// Re-export commonly used types
pub use assembler::{AssembledPage, RawRow, RecordAssembler};
pub use cleaner::{clean, clean_file, CleanReport};
pub use dataset::{Dataset, DatasetWriter};
pub use encoder::{CategoryEncoder, EncoderRegistry, EncoderRegistryBuilder, UNSEEN_CODE};
pub use features::{FeatureKind, FeaturePlan, FeatureSpec, FeatureValue};
pub use normalize::{FieldNormalizer, WeightReading};
