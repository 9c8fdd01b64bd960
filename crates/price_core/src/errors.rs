//! Error types for the price core

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A mandatory artifact (feature list or model) is missing or corrupt.
#[derive(Error, Debug)]
pub enum ArtifactLoadError {
    /// Artifact file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Feature list contained no names
    #[error("feature list {0} is empty")]
    EmptyFeatureList(PathBuf),

    /// Feature list repeats a name
    #[error("feature list repeats column '{0}'")]
    DuplicateFeature(String),

    /// Model bytes could not be decoded
    #[error("failed to decode model {path}: {reason}")]
    ModelDecode { path: PathBuf, reason: String },

    /// Model decoded but failed structural validation
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// Model expects a different number of inputs than the feature list declares
    #[error("model expects {model} features but the feature list has {features}")]
    FeatureCountMismatch { model: usize, features: usize },
}

/// Optional side-files that may fall back to an empty mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuxArtifact {
    TransformMeta,
    ScalerParams,
    NameCodes,
    CategoricalLevels,
}

impl fmt::Display for AuxArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuxArtifact::TransformMeta => "transform metadata",
            AuxArtifact::ScalerParams => "scaler parameters",
            AuxArtifact::NameCodes => "name code mapping",
            AuxArtifact::CategoricalLevels => "categorical levels",
        };
        f.write_str(name)
    }
}

/// Record of an optional artifact that defaulted to empty at load time.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DegradedArtifact {
    pub artifact: AuxArtifact,
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for DegradedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.artifact, self.path.display(), self.reason)
    }
}

/// Input validation failures raised before any model call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("required field '{0}' is missing")]
    MissingField(String),

    #[error("field '{field}' must be {expected}")]
    InvalidFieldType { field: String, expected: &'static str },

    #[error("row index {index} is out of range (0-{})", .len.saturating_sub(1))]
    IndexOutOfRange { index: i64, len: usize },

    #[error("unknown {attribute} value '{value}'")]
    UnknownCategory { attribute: String, value: String },
}

/// Contract violations between the encoder and the predictor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PredictError {
    #[error("feature vector has {actual} values, model expects {expected}")]
    FeatureVectorLengthMismatch { expected: usize, actual: usize },
}

/// Canonical dataset loading failures.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset has no header row")]
    MissingHeader,

    #[error("line {line}: expected {expected} columns, got {actual}")]
    Ragged {
        line: usize,
        expected: usize,
        actual: usize,
    },
}

/// Failures while writing an artifact set.
#[derive(Error, Debug)]
pub enum ArtifactWriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model error: {0}")]
    Model(#[from] crate::gbdt::ModelError),
}

/// Failures while fitting encoders on training records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FitError {
    #[error("cannot fit encoders on an empty record set")]
    EmptyInput,

    #[error("fitted feature list repeats column '{0}'")]
    DuplicateFeature(String),
}

/// Umbrella error for callers that drive the whole encode-and-predict path.
#[derive(Error, Debug)]
pub enum PriceError {
    #[error(transparent)]
    Artifact(#[from] ArtifactLoadError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Fit(#[from] FitError),
}

/// Result type for price core operations
pub type Result<T> = std::result::Result<T, PriceError>;
