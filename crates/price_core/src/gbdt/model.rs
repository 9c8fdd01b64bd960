//! Gradient-boosted ensemble of regression trees
//!
//! The raw score is `base_score` plus the sum of the leaf values reached in
//! each tree. Leaf values are stored post-shrinkage, so inference never needs
//! the learning rate; it is kept only as training provenance.

use super::tree::Tree;
use crate::model::Regressor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Only supported model format version
pub const MODEL_VERSION: u32 = 1;

/// GBDT Model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Binary encoding error: {0}")]
    BincodeError(#[from] bincode::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GbdtModel {
    /// Model format version
    pub version: u32,

    /// Width of the feature vector the trees were grown on
    pub num_features: usize,

    /// Initial prediction before any tree is added
    pub base_score: f64,

    /// Shrinkage used during training
    pub learning_rate: f64,

    /// Boosting rounds in training order
    pub trees: Vec<Tree>,

    /// Round count with the best validation score, when early stopping ran
    pub best_iteration: Option<usize>,
}

impl GbdtModel {
    pub fn new(num_features: usize, base_score: f64, learning_rate: f64, trees: Vec<Tree>) -> Self {
        Self {
            version: MODEL_VERSION,
            num_features,
            base_score,
            learning_rate,
            trees,
            best_iteration: None,
        }
    }

    pub fn with_best_iteration(mut self, best_iteration: Option<usize>) -> Self {
        self.best_iteration = best_iteration;
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != MODEL_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if !self.base_score.is_finite() {
            return Err(ModelError::ValidationFailed(
                "base_score is not finite".to_string(),
            ));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| {
                ModelError::ValidationFailed(format!("Tree {i} validation failed: {e}"))
            })?;

            if let Some(max_idx) = tree.max_feature_idx() {
                if max_idx >= self.num_features {
                    return Err(ModelError::ValidationFailed(format!(
                        "Tree {i} splits on feature {max_idx} but the model has {} features",
                        self.num_features
                    )));
                }
            }
        }

        if let Some(best) = self.best_iteration {
            if best > self.trees.len() {
                return Err(ModelError::ValidationFailed(format!(
                    "best_iteration {best} exceeds tree count {}",
                    self.trees.len()
                )));
            }
        }

        Ok(())
    }

    /// Raw ensemble score using the first `num_iteration` trees
    ///
    /// `None`, `Some(0)`, or a value past the tree count all mean "every tree".
    pub fn predict(&self, features: &[f64], num_iteration: Option<usize>) -> f64 {
        let limit = match num_iteration {
            Some(n) if n > 0 => n.min(self.trees.len()),
            _ => self.trees.len(),
        };

        self.trees[..limit]
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.evaluate(features))
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Split counts per feature index
    pub fn feature_importance(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_features];
        for node in self.trees.iter().flat_map(|t| t.nodes.iter()) {
            if node.is_leaf() {
                continue;
            }
            if let Some(slot) = usize::try_from(node.feature_idx)
                .ok()
                .and_then(|i| counts.get_mut(i))
            {
                *slot += 1;
            }
        }
        counts
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let model: GbdtModel = bincode::deserialize(bytes)?;
        model.validate()?;
        Ok(model)
    }

    /// BLAKE3 digest of the binary encoding as hex
    pub fn fingerprint(&self) -> Result<String, ModelError> {
        let bytes = self.to_bytes()?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }

    /// Save model; `.json` paths get JSON, anything else the binary encoding
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        let path = path.as_ref();
        if is_json_path(path) {
            fs::write(path, serde_json::to_string_pretty(self)?)?;
        } else {
            fs::write(path, self.to_bytes()?)?;
        }
        Ok(())
    }

    /// Load and validate a model written by [`GbdtModel::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        if is_json_path(path) {
            let json = fs::read_to_string(path)?;
            let model: GbdtModel = serde_json::from_str(&json)?;
            model.validate()?;
            Ok(model)
        } else {
            Self::from_bytes(&fs::read(path)?)
        }
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl Regressor for GbdtModel {
    fn predict_raw(&self, features: &[f64], num_iteration: Option<usize>) -> f64 {
        self.predict(features, num_iteration)
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    fn num_trees(&self) -> usize {
        self.trees.len()
    }

    fn fingerprint(&self) -> Option<String> {
        GbdtModel::fingerprint(self).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::tree::Node;

    fn create_test_model() -> GbdtModel {
        let tree1 = Tree::new(vec![
            Node::internal(0, 0, 50.0, 1, 2),
            Node::leaf(1, 1.0),
            Node::leaf(2, 2.0),
        ]);
        let tree2 = Tree::new(vec![
            Node::internal(0, 1, 30.0, 1, 2),
            Node::leaf(1, -0.5),
            Node::leaf(2, 0.5),
        ]);
        GbdtModel::new(2, 10.0, 0.1, vec![tree1, tree2])
    }

    #[test]
    fn test_model_inference() {
        let model = create_test_model();
        // Tree 1 goes left (1.0), tree 2 goes left (-0.5)
        assert_eq!(model.predict(&[30.0, 20.0], None), 10.5);
        // Tree 1 goes right (2.0), tree 2 goes right (0.5)
        assert_eq!(model.predict(&[60.0, 40.0], None), 12.5);
    }

    #[test]
    fn test_num_iteration_limits_trees() {
        let model = create_test_model();
        assert_eq!(model.predict(&[30.0, 20.0], Some(1)), 11.0);
        assert_eq!(model.predict(&[30.0, 20.0], Some(0)), 10.5);
        assert_eq!(model.predict(&[30.0, 20.0], Some(99)), 10.5);
    }

    #[test]
    fn test_model_validation() {
        assert!(create_test_model().validate().is_ok());

        let mut wrong_version = create_test_model();
        wrong_version.version = 999;
        assert!(wrong_version.validate().is_err());

        let mut too_narrow = create_test_model();
        too_narrow.num_features = 1;
        assert!(too_narrow.validate().is_err());

        let overshoot = create_test_model().with_best_iteration(Some(3));
        assert!(overshoot.validate().is_err());
    }

    #[test]
    fn test_feature_importance_counts_splits() {
        let model = create_test_model();
        assert_eq!(model.feature_importance(), vec![1, 1]);
    }

    #[test]
    fn test_save_load_binary_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let model = create_test_model().with_best_iteration(Some(1));

        let bin_path = dir.path().join("model.bin");
        model.save(&bin_path).unwrap();
        assert_eq!(GbdtModel::load(&bin_path).unwrap(), model);

        let json_path = dir.path().join("model.json");
        model.save(&json_path).unwrap();
        assert_eq!(GbdtModel::load(&json_path).unwrap(), model);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let model1 = create_test_model();
        let mut model2 = create_test_model();
        assert_eq!(model1.fingerprint().unwrap(), model2.fingerprint().unwrap());
        assert_eq!(model1.fingerprint().unwrap().len(), 64);

        model2.base_score = 11.0;
        assert_ne!(model1.fingerprint().unwrap(), model2.fingerprint().unwrap());
    }
}
