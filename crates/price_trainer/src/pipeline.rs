//! End-to-end training and evaluation runs
//!
//! Training fits the encoders, encodes every record through the same
//! transform the server uses, trains on `log1p(price)` and writes the
//! artifact set plus an engineered dataset for row-mode serving.

use anyhow::{Context, Result};
use carprice_core::schema::{DEFAULT_REFERENCE_YEAR, TARGET_COLUMN};
use carprice_core::{
    ArtifactPaths, ArtifactStore, ArtifactWriter, CarAttributes, EncodingArtifacts, FeatureEncoder,
    FeatureOrder, TransformMeta, UnknownCategoryPolicy,
};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::dataset::RawDataset;
use crate::deterministic::train_test_split;
use crate::metrics::{RegressionMetrics, ResidualStats};
use crate::trainer::{GbdtTrainer, TrainingParams, TrainingSet};

/// Inputs of one training run
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Engineered dataset destination; `None` skips it
    pub engineered_csv: Option<PathBuf>,
    pub params: TrainingParams,
    pub seed: i64,
    pub test_fraction: f64,
    pub reference_year: i32,
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            engineered_csv: None,
            params: TrainingParams::default(),
            seed: 42,
            test_fraction: 0.2,
            reference_year: DEFAULT_REFERENCE_YEAR,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub splits: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct TrainingReport {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub num_features: usize,
    pub num_trees: usize,
    pub best_iteration: Option<usize>,
    pub train: RegressionMetrics,
    pub test: Option<RegressionMetrics>,
    pub top_features: Vec<FeatureImportance>,
    pub model_hash: String,
}

/// Fit, train, score and persist
pub fn run_training(config: &PipelineConfig) -> Result<TrainingReport> {
    if !(0.0..1.0).contains(&config.test_fraction) {
        anyhow::bail!("test fraction must be in [0, 1), got {}", config.test_fraction);
    }

    info!("Loading dataset from: {}", config.input.display());
    let raw = RawDataset::from_csv(&config.input)
        .with_context(|| format!("Failed to load {}", config.input.display()))?;
    info!("Loaded {} cars", raw.len());

    let encoding = EncodingArtifacts::fit(&raw.records, config.reference_year)
        .context("Failed to fit encoders")?;
    info!(
        "Fitted encoders: {} features, {} car names",
        encoding.feature_order.len(),
        encoding.name_codes.len()
    );

    let encoder = FeatureEncoder::new(&encoding, UnknownCategoryPolicy::Reject);
    let features = encode_all(&encoder, &raw.records)?;
    let targets: Vec<f64> = raw.prices.iter().map(|p| p.ln_1p()).collect();
    let full = TrainingSet::new(features, targets);

    let (train_idx, test_idx) = train_test_split(full.len(), config.test_fraction, config.seed);
    let train = full.subset(&train_idx);
    let test = full.subset(&test_idx);
    info!(
        "Split with seed {}: {} train / {} test",
        config.seed,
        train.len(),
        test.len()
    );

    let trainer = GbdtTrainer::new(config.params.clone());
    let valid = (!test.is_empty()).then_some(&test);
    let outcome = trainer.train(&train, valid).context("Training failed")?;
    let model = outcome.model;
    info!(
        "Training complete: {} trees, best iteration {:?}",
        model.num_trees(),
        outcome.best_iteration
    );

    let score = |set: &TrainingSet| {
        let predictions: Vec<f64> = set
            .features
            .iter()
            .map(|row| model.predict(row, outcome.best_iteration))
            .collect();
        RegressionMetrics::compute(&set.targets, &predictions)
    };
    let train_metrics = score(&train);
    let test_metrics = valid.map(score);
    log_metrics("Train", &train_metrics);
    if let Some(m) = &test_metrics {
        log_metrics("Test", m);
    }

    let top_features = top_importance(&encoding.feature_order, &model.feature_importance(), 10);
    info!("Top {} features by split count:", top_features.len());
    for entry in &top_features {
        info!("  {}: {}", entry.feature, entry.splits);
    }

    let model_hash = model.fingerprint().context("Failed to hash model")?;
    let meta = build_meta(
        config,
        &encoding,
        outcome.best_iteration,
        &train_metrics,
        test_metrics.as_ref(),
        &model_hash,
    );

    let writer = ArtifactWriter::in_dir(&config.output_dir);
    writer
        .write(&encoding, &meta, &model)
        .with_context(|| format!("Failed to write artifacts to {}", config.output_dir.display()))?;
    info!("Artifacts written to {}", config.output_dir.display());

    if let Some(path) = &config.engineered_csv {
        write_engineered_csv(path, &encoding.feature_order, &full.features, &raw.prices)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Engineered dataset written to {}", path.display());
    }

    Ok(TrainingReport {
        rows: full.len(),
        train_rows: train.len(),
        test_rows: test.len(),
        num_features: encoding.feature_order.len(),
        num_trees: model.num_trees(),
        best_iteration: outcome.best_iteration,
        train: train_metrics,
        test: test_metrics,
        top_features,
        model_hash,
    })
}

fn encode_all(encoder: &FeatureEncoder<'_>, records: &[CarAttributes]) -> Result<Vec<Vec<f64>>> {
    records
        .iter()
        .enumerate()
        .map(|(i, car)| {
            encoder
                .encode_attributes(car)
                .map(|v| v.into_inner())
                .with_context(|| format!("Failed to encode record {i}"))
        })
        .collect()
}

fn log_metrics(label: &str, metrics: &RegressionMetrics) {
    info!(
        "{label}: RMSE(log) {:.4}, R²(log) {:.4}, MAE {:.2}, MAPE {:.2}%",
        metrics.rmse, metrics.r2, metrics.mae, metrics.mape
    );
}

fn top_importance(order: &FeatureOrder, counts: &[usize], n: usize) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = order
        .names()
        .iter()
        .zip(counts)
        .map(|(feature, &splits)| FeatureImportance {
            feature: feature.clone(),
            splits,
        })
        .collect();
    // Stable sort keeps feature order among equal counts
    ranked.sort_by(|a, b| b.splits.cmp(&a.splits));
    ranked.truncate(n);
    ranked
}

fn build_meta(
    config: &PipelineConfig,
    encoding: &EncodingArtifacts,
    best_iteration: Option<usize>,
    train: &RegressionMetrics,
    test: Option<&RegressionMetrics>,
    model_hash: &str,
) -> TransformMeta {
    let mut meta = TransformMeta::log1p();
    meta.best_iteration = best_iteration;
    meta.reference_year = Some(config.reference_year);

    let extra = &mut meta.extra;
    extra.insert("num_features".into(), Value::from(encoding.feature_order.len()));
    extra.insert("train_rmse".into(), Value::from(train.rmse));
    extra.insert("train_r2".into(), Value::from(train.r2));
    extra.insert("train_mae".into(), Value::from(train.mae));
    if let Some(test) = test {
        extra.insert("test_rmse".into(), Value::from(test.rmse));
        extra.insert("test_r2".into(), Value::from(test.r2));
        extra.insert("test_mae".into(), Value::from(test.mae));
        extra.insert("test_mape".into(), Value::from(test.mape));
    }
    extra.insert("learning_rate".into(), Value::from(config.params.learning_rate));
    extra.insert("seed".into(), Value::from(config.seed));
    extra.insert("model_hash".into(), Value::from(model_hash));
    extra.insert("trained_at".into(), Value::from(chrono::Utc::now().to_rfc3339()));
    meta
}

/// Write `FeatureOrder` columns plus the raw price, one row per record
pub fn write_engineered_csv(
    path: &Path,
    order: &FeatureOrder,
    features: &[Vec<f64>],
    prices: &[f64],
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;

    let mut header: Vec<&str> = order.names().iter().map(String::as_str).collect();
    header.push(TARGET_COLUMN);
    writer.write_record(&header)?;

    for (row, price) in features.iter().zip(prices) {
        // f64 Display round-trips exactly, so row mode sees the same bits
        let mut fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        fields.push(price.to_string());
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Clone, Debug, Serialize)]
pub struct WorstPrediction {
    pub index: usize,
    pub name: String,
    pub actual: f64,
    pub predicted: f64,
    pub abs_error: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct EvaluationReport {
    pub rows: usize,
    pub metrics: RegressionMetrics,
    pub residuals: ResidualStats,
    pub worst: Vec<WorstPrediction>,
}

/// Score an existing artifact set against a raw CSV through manual mode
pub fn run_evaluation(artifacts_dir: &Path, input: &Path, worst_n: usize) -> Result<EvaluationReport> {
    let store = ArtifactStore::load(&ArtifactPaths::in_dir(artifacts_dir))
        .with_context(|| format!("Failed to load artifacts from {}", artifacts_dir.display()))?;
    for degraded in store.degraded() {
        warn!("Evaluating with degraded artifact: {}", degraded);
    }

    let raw = RawDataset::from_csv(input)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    let encoder = store.encoder(UnknownCategoryPolicy::Ignore);
    let predictor = store.predictor();

    let mut log_actual = Vec::with_capacity(raw.len());
    let mut log_predicted = Vec::with_capacity(raw.len());
    let mut predicted_prices = Vec::with_capacity(raw.len());
    let mut worst = Vec::with_capacity(raw.len());

    for (index, (car, &actual)) in raw.records.iter().zip(&raw.prices).enumerate() {
        let vector = encoder
            .encode_attributes(car)
            .with_context(|| format!("Failed to encode record {index}"))?;
        let prediction = predictor.predict(&vector)?;

        log_actual.push(actual.ln_1p());
        log_predicted.push(prediction.price.ln_1p());
        predicted_prices.push(prediction.price);
        worst.push(WorstPrediction {
            index,
            name: car.name.clone(),
            actual,
            predicted: prediction.price,
            abs_error: (actual - prediction.price).abs(),
        });
    }

    worst.sort_by(|a, b| b.abs_error.total_cmp(&a.abs_error).then(a.index.cmp(&b.index)));
    worst.truncate(worst_n);

    let metrics = RegressionMetrics::compute(&log_actual, &log_predicted);
    log_metrics("Evaluation", &metrics);
    let residuals = ResidualStats::compute(&raw.prices, &predicted_prices);
    info!(
        "Residuals: mean {:.2}, std {:.2}, min {:.2}, max {:.2}, mean error {:.2}%",
        residuals.mean, residuals.std, residuals.min, residuals.max, residuals.mean_pct_error
    );

    Ok(EvaluationReport {
        rows: raw.len(),
        metrics,
        residuals,
        worst,
    })
}
