use carprice_core::{ArtifactWriteError, EncodeError, FitError};
use thiserror::Error;

/// Errors returned by the deterministic trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset is missing column '{0}'")]
    MissingColumn(String),

    #[error("line {line}, column '{column}': invalid value '{value}'")]
    InvalidValue {
        line: usize,
        column: String,
        value: String,
    },

    #[error("line {line}: selling_price must be a positive number")]
    InvalidTarget { line: usize },

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("invalid training parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Artifacts(#[from] ArtifactWriteError),
}
