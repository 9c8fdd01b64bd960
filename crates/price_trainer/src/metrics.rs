//! Regression metrics

use serde::Serialize;

pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let sse: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    (sse / actual.len() as f64).sqrt()
}

pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Mean absolute percentage error in percent; rows with a zero actual are skipped
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    let (sum, count) = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .fold((0.0, 0usize), |(sum, count), (a, p)| {
            (sum + ((a - p) / a).abs(), count + 1)
        });
    if count == 0 {
        0.0
    } else {
        100.0 * sum / count as f64
    }
}

/// Coefficient of determination; 0 when the actuals are constant
pub fn r2(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    1.0 - ss_res / ss_tot
}

/// Score set reported by training and evaluation
///
/// RMSE and R² are computed on the log-transformed target, MAE and MAPE on
/// prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub r2: f64,
    pub mae: f64,
    pub mape: f64,
}

impl RegressionMetrics {
    pub fn compute(log_actual: &[f64], log_predicted: &[f64]) -> Self {
        let price_actual: Vec<f64> = log_actual.iter().map(|v| v.exp_m1()).collect();
        let price_predicted: Vec<f64> = log_predicted.iter().map(|v| v.exp_m1().max(0.0)).collect();
        Self {
            rmse: rmse(log_actual, log_predicted),
            r2: r2(log_actual, log_predicted),
            mae: mae(&price_actual, &price_predicted),
            mape: mape(&price_actual, &price_predicted),
        }
    }
}

/// Distribution of `actual - predicted` over prices
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResidualStats {
    pub mean: f64,
    /// Sample standard deviation; 0 below two rows
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Mean of `residual / actual` in percent, skipping zero actuals
    pub mean_pct_error: f64,
}

impl ResidualStats {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        let residuals: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
        if residuals.is_empty() {
            return Self {
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
                mean_pct_error: 0.0,
            };
        }

        let n = residuals.len() as f64;
        let mean = residuals.iter().sum::<f64>() / n;
        let std = if residuals.len() > 1 {
            let ss: f64 = residuals.iter().map(|r| (r - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        let (pct_sum, pct_count) = actual
            .iter()
            .zip(&residuals)
            .filter(|(a, _)| **a != 0.0)
            .fold((0.0, 0usize), |(sum, count), (a, r)| (sum + r / a * 100.0, count + 1));

        Self {
            mean,
            std,
            min: residuals.iter().copied().fold(f64::INFINITY, f64::min),
            max: residuals.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean_pct_error: if pct_count == 0 {
                0.0
            } else {
                pct_sum / pct_count as f64
            },
        }
    }
}
