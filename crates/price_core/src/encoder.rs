//! Feature Encoder: raw record or dataset row to a model-ready vector
//!
//! Both entry modes produce a vector of exactly `FeatureOrder` length, in
//! `FeatureOrder` order. Names that the encoding step did not produce are 0.

use crate::artifacts::{ArtifactStore, EncodingArtifacts};
use crate::dataset::Dataset;
use crate::errors::EncodeError;
use crate::record::CarAttributes;
use crate::schema::{CategoricalAttribute, NAME_CODE_FEATURE, TARGET_COLUMN};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// Behaviour when a categorical value has no one-hot column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCategoryPolicy {
    /// Leave every column of the attribute at 0
    #[default]
    Ignore,
    /// Fail with [`EncodeError::UnknownCategory`]
    Reject,
}

impl FromStr for UnknownCategoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown category policy '{other}' (expected ignore or reject)")),
        }
    }
}

impl fmt::Display for UnknownCategoryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignore => f.write_str("ignore"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

/// Ordered numeric vector aligned to `FeatureOrder`
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl Deref for FeatureVector {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureEncoder<'a> {
    artifacts: &'a EncodingArtifacts,
    policy: UnknownCategoryPolicy,
}

impl<'a> FeatureEncoder<'a> {
    pub fn new(artifacts: &'a EncodingArtifacts, policy: UnknownCategoryPolicy) -> Self {
        Self { artifacts, policy }
    }

    /// Project one dataset row onto the feature order
    ///
    /// The row index is taken as a signed integer so that negative requests
    /// are reported as out of range rather than wrapped.
    pub fn encode_from_row(&self, dataset: &Dataset, row_index: i64) -> Result<FeatureVector, EncodeError> {
        let out_of_range = || EncodeError::IndexOutOfRange {
            index: row_index,
            len: dataset.len(),
        };
        let row = usize::try_from(row_index).map_err(|_| out_of_range())?;
        if row >= dataset.len() {
            return Err(out_of_range());
        }

        let values = self
            .artifacts
            .feature_order
            .names()
            .iter()
            .map(|name| {
                if name == TARGET_COLUMN {
                    return 0.0;
                }
                dataset.value(row, name).map_or(0.0, |cell| cell.as_feature())
            })
            .collect();
        Ok(FeatureVector(values))
    }

    /// Validate a manual-input JSON object and encode it
    pub fn encode_from_manual(&self, record: &Value) -> Result<FeatureVector, EncodeError> {
        let car = CarAttributes::from_manual_json(record)?;
        self.encode_attributes(&car)
    }

    /// Shared transform used by manual mode and by the training pipeline
    pub fn encode_attributes(&self, car: &CarAttributes) -> Result<FeatureVector, EncodeError> {
        let order = &self.artifacts.feature_order;
        let mut values = vec![0.0; order.len()];

        for (feature, raw) in car.numeric_features(self.artifacts.reference_year) {
            if let Some(pos) = order.position(feature) {
                values[pos] = self.artifacts.scaler.standardize(feature, raw);
            }
        }

        if let Some(pos) = order.position(NAME_CODE_FEATURE) {
            values[pos] = self.artifacts.name_codes.code(&car.name) as f64;
        }

        for attribute in CategoricalAttribute::ALL {
            let value = car.categorical(attribute);
            match order.position(&attribute.one_hot_column(value)) {
                Some(pos) => values[pos] = 1.0,
                None if self.policy == UnknownCategoryPolicy::Reject => {
                    return Err(EncodeError::UnknownCategory {
                        attribute: attribute.attribute_name().to_string(),
                        value: value.to_string(),
                    });
                }
                None => {}
            }
        }

        Ok(FeatureVector(values))
    }
}

impl ArtifactStore {
    pub fn encoder(&self, policy: UnknownCategoryPolicy) -> FeatureEncoder<'_> {
        FeatureEncoder::new(self.encoding(), policy)
    }
}
