//! Gradient Boosted Decision Tree (GBDT) trainer
//!
//! Squared-loss boosting with exact-greedy CART trees and optional early
//! stopping on a validation set.

use carprice_core::gbdt::{GbdtModel, Tree};
use tracing::{debug, info};

use crate::cart::{presort_columns, CartBuilder, TreeConfig};
use crate::errors::TrainerError;
use crate::metrics::rmse;

/// Boosting parameters
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingParams {
    pub num_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub l2_regularization: f64,
    /// Stop after this many rounds without a validation improvement; 0 disables
    pub early_stopping_rounds: usize,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            num_rounds: 1000,
            learning_rate: 0.05,
            max_depth: 6,
            min_samples_leaf: 20,
            l2_regularization: 0.0,
            early_stopping_rounds: 50,
        }
    }
}

impl TrainingParams {
    pub fn validate(&self) -> Result<(), TrainerError> {
        if self.num_rounds == 0 {
            return Err(TrainerError::InvalidParams("num_rounds must be positive".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(TrainerError::InvalidParams(format!(
                "learning_rate must be in (0, 1], got {}",
                self.learning_rate
            )));
        }
        if !(self.l2_regularization >= 0.0 && self.l2_regularization.is_finite()) {
            return Err(TrainerError::InvalidParams(
                "l2_regularization must be non-negative".into(),
            ));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            l2_regularization: self.l2_regularization,
        }
    }
}

/// Encoded rows and their (already transformed) targets
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingSet {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl TrainingSet {
    pub fn new(features: Vec<Vec<f64>>, targets: Vec<f64>) -> Self {
        Self { features, targets }
    }

    /// Rows selected by `indices`, in that order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }
}

/// Trained model plus early-stopping bookkeeping
#[derive(Clone, Debug)]
pub struct TrainingOutcome {
    pub model: GbdtModel,
    pub best_iteration: Option<usize>,
    pub best_valid_rmse: Option<f64>,
}

/// GBDT trainer
pub struct GbdtTrainer {
    params: TrainingParams,
}

impl GbdtTrainer {
    pub fn new(params: TrainingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    /// Train on `train`, early-stopping on `valid` when given
    pub fn train(
        &self,
        train: &TrainingSet,
        valid: Option<&TrainingSet>,
    ) -> Result<TrainingOutcome, TrainerError> {
        self.params.validate()?;
        if train.is_empty() {
            return Err(TrainerError::EmptyDataset);
        }
        let feature_count = train.feature_count();
        if train.features.iter().any(|row| row.len() != feature_count)
            || valid.is_some_and(|v| v.features.iter().any(|row| row.len() != feature_count))
        {
            return Err(TrainerError::InvalidParams(
                "all rows must have the same number of features".into(),
            ));
        }

        let base_score = mean(&train.targets);
        let mut predictions = vec![base_score; train.len()];
        let mut valid_predictions = valid.map(|v| vec![base_score; v.len()]);

        let presorted = presort_columns(&train.features, feature_count);
        let hessians = vec![1.0; train.len()];
        let early_stopping = self.params.early_stopping_rounds;

        let mut trees = Vec::with_capacity(self.params.num_rounds);
        let mut best: Option<(usize, f64)> = None;

        for round in 1..=self.params.num_rounds {
            // Squared loss: gradient = prediction - target, hessian = 1
            let gradients: Vec<f64> = predictions
                .iter()
                .zip(&train.targets)
                .map(|(p, t)| p - t)
                .collect();

            let builder =
                CartBuilder::new(&train.features, &gradients, &hessians, self.params.tree_config());
            let mut tree = builder.build(&presorted);
            shrink(&mut tree, self.params.learning_rate);

            for (pred, row) in predictions.iter_mut().zip(&train.features) {
                *pred += tree.evaluate(row);
            }

            if let (Some(valid), Some(valid_preds)) = (valid, valid_predictions.as_mut()) {
                for (pred, row) in valid_preds.iter_mut().zip(&valid.features) {
                    *pred += tree.evaluate(row);
                }
                let score = rmse(&valid.targets, valid_preds);
                if best.map_or(true, |(_, best_score)| score < best_score) {
                    best = Some((round, score));
                }
                debug!("round {round}: valid rmse {score:.6}");
                if round % 100 == 0 {
                    info!(
                        "[{round}] train rmse {:.6}, valid rmse {score:.6}",
                        rmse(&train.targets, &predictions)
                    );
                }
            } else if round % 100 == 0 {
                info!("[{round}] train rmse {:.6}", rmse(&train.targets, &predictions));
            }

            trees.push(tree);

            if let Some((best_round, best_score)) = best {
                if early_stopping > 0 && round - best_round >= early_stopping {
                    info!(
                        "Early stopping at round {round}; best iteration {best_round} (valid rmse {best_score:.6})"
                    );
                    break;
                }
            }
        }

        let best_iteration = best.map(|(round, _)| round);
        let model = GbdtModel::new(feature_count, base_score, self.params.learning_rate, trees)
            .with_best_iteration(best_iteration);

        Ok(TrainingOutcome {
            model,
            best_iteration,
            best_valid_rmse: best.map(|(_, score)| score),
        })
    }
}

/// Scale every leaf by the learning rate so inference is a plain sum
fn shrink(tree: &mut Tree, learning_rate: f64) {
    for node in &mut tree.nodes {
        if let Some(value) = node.leaf.as_mut() {
            *value *= learning_rate;
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
