//! Trained-model seam used by the predictor

use serde::Serialize;
use std::fmt;

/// A trained regressor that scores one feature vector at a time.
///
/// Implementations must be safe for concurrent read-only inference: the
/// server shares a single instance across all requests.
pub trait Regressor: Send + Sync + fmt::Debug {
    /// Raw model output for `features`, optionally bounded to the first
    /// `num_iteration` boosting rounds.
    fn predict_raw(&self, features: &[f64], num_iteration: Option<usize>) -> f64;

    /// Width of the feature vector the model was trained on
    fn num_features(&self) -> usize;

    /// Early-stopping cutoff recorded inside the model itself
    fn best_iteration(&self) -> Option<usize> {
        None
    }

    fn num_trees(&self) -> usize {
        0
    }

    fn fingerprint(&self) -> Option<String> {
        None
    }
}

/// Read-only description of the loaded model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub num_trees: usize,
    pub num_features: usize,
    pub best_iteration: Option<usize>,
    pub fingerprint: Option<String>,
}

impl ModelSummary {
    pub fn of(model: &dyn Regressor) -> Self {
        Self {
            num_trees: model.num_trees(),
            num_features: model.num_features(),
            best_iteration: model.best_iteration(),
            fingerprint: model.fingerprint(),
        }
    }
}
