//! Carprice Trainer - deterministic offline GBDT trainer
//!
//! Produces the artifact set consumed by `carprice-core`: encoders are fitted
//! here and every record is encoded with the core's own transform.

pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod metrics;
pub mod pipeline;
pub mod trainer;

pub use dataset::{RawDataset, RAW_COLUMNS};
pub use deterministic::{shuffled_indices, train_test_split, LcgRng, SplitTieBreaker};
pub use errors::TrainerError;
pub use metrics::{RegressionMetrics, ResidualStats};
pub use pipeline::{run_evaluation, run_training, EvaluationReport, PipelineConfig, TrainingReport};
pub use trainer::{GbdtTrainer, TrainingOutcome, TrainingParams, TrainingSet};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
