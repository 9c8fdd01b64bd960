//! Predictor: feature vector to a non-negative price

use crate::artifacts::{ArtifactStore, TargetTransform};
use crate::errors::PredictError;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePrediction {
    /// Price in the original currency, never negative
    pub price: f64,
    /// Model output before the inverse transform
    pub raw_score: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Predictor<'a> {
    store: &'a ArtifactStore,
}

impl<'a> Predictor<'a> {
    pub fn new(store: &'a ArtifactStore) -> Self {
        Self { store }
    }

    /// Score `features` and map the result back to a price
    ///
    /// The length is checked before the model is touched.
    pub fn predict(&self, features: &[f64]) -> Result<PricePrediction, PredictError> {
        let expected = self.store.feature_order().len();
        if features.len() != expected {
            return Err(PredictError::FeatureVectorLengthMismatch {
                expected,
                actual: features.len(),
            });
        }

        let best_iteration = self.store.best_iteration();
        let raw_score = self.store.model().predict_raw(features, best_iteration);
        let transform = self.store.meta().target_transform();
        let price = clamp_price(transform.inverse(raw_score));

        debug!(
            "raw={:.6} price={:.2} transform={:?} best_iteration={:?}",
            raw_score, price, transform, best_iteration
        );
        Ok(PricePrediction { price, raw_score })
    }

    pub fn transform(&self) -> TargetTransform {
        self.store.meta().target_transform()
    }
}

fn clamp_price(price: f64) -> f64 {
    // Also maps NaN to 0
    if price > 0.0 {
        price
    } else {
        0.0
    }
}

impl ArtifactStore {
    pub fn predictor(&self) -> Predictor<'_> {
        Predictor::new(self)
    }
}
