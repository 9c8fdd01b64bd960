//! Integration tests for the training pipeline
//!
//! Ensures identical models across runs and that the engineered dataset
//! agrees with manual encoding of the same raw records.

use anyhow::Result;
use carprice_core::{ArtifactPaths, ArtifactStore, Dataset, UnknownCategoryPolicy};
use carprice_trainer::{run_evaluation, run_training, PipelineConfig, RawDataset, TrainingParams};
use serde_json::json;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const NAMES: [&str; 5] = [
    "Maruti Swift",
    "Hyundai i20",
    "Honda City",
    "Tata Nano",
    "Toyota Innova",
];
const FUELS: [&str; 3] = ["Petrol", "Diesel", "CNG"];
const OWNERS: [&str; 3] = ["First Owner", "Second Owner", "Third Owner"];

/// Synthetic raw CSV: newer, more powerful cars with fewer km sell higher
fn write_synthetic_csv(dir: &Path, rows: usize) -> Result<PathBuf> {
    let mut csv = String::from(
        "name,year,selling_price,km_driven,fuel,seller_type,transmission,owner,mileage,engine,max_power,seats\n",
    );
    for i in 0..rows {
        let name = NAMES[i % NAMES.len()];
        let year = 2005 + (i * 7 % 18) as i32;
        let km = 5_000 + (i * 3_719 % 150_000);
        let engine = 800 + (i % 12) * 150;
        let power = 40.0 + (i % 9) as f64 * 12.5;
        let mileage = 12.0 + (i % 15) as f64 * 0.9;
        let seats = if i % 11 == 0 { 7 } else { 5 };
        let fuel = FUELS[i % FUELS.len()];
        let seller = if i % 4 == 0 { "Dealer" } else { "Individual" };
        let transmission = if i % 5 == 0 { "Automatic" } else { "Manual" };
        let owner = OWNERS[i % OWNERS.len()];

        let price = 150_000.0
            + (year - 2005) as f64 * 35_000.0
            + power * 2_000.0
            - km as f64 * 0.8
            + if transmission == "Automatic" { 120_000.0 } else { 0.0 };

        writeln!(
            csv,
            "{name},{year},{price:.0},{km},{fuel},{seller},{transmission},{owner},{mileage:.1},{engine},{power:.1},{seats}"
        )?;
    }
    let path = dir.join("cars.csv");
    std::fs::write(&path, csv)?;
    Ok(path)
}

fn small_config(input: &Path, output: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::new(input, output);
    config.params = TrainingParams {
        num_rounds: 60,
        learning_rate: 0.2,
        max_depth: 3,
        min_samples_leaf: 5,
        l2_regularization: 0.0,
        early_stopping_rounds: 10,
    };
    config.engineered_csv = Some(output.join("engineered.csv"));
    config
}

#[test]
fn test_training_writes_loadable_artifacts() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_synthetic_csv(dir.path(), 150)?;
    let output = dir.path().join("artifacts");

    let report = run_training(&small_config(&input, &output))?;
    assert_eq!(report.rows, 150);
    assert_eq!(report.test_rows, 30);
    assert!(report.num_trees >= 1);
    if let Some(best) = report.best_iteration {
        assert!(best <= report.num_trees);
    }
    assert!(report.top_features.len() <= 10);

    let store = ArtifactStore::load(&ArtifactPaths::in_dir(&output))?;
    assert!(!store.is_degraded());
    assert_eq!(store.meta().best_iteration, report.best_iteration);
    assert_eq!(store.meta().reference_year, Some(2025));
    assert!(store.meta().extra.contains_key("test_rmse"));
    assert_eq!(
        store.meta().extra.get("model_hash"),
        Some(&json!(report.model_hash))
    );
    assert_eq!(store.name_codes().len(), NAMES.len());
    Ok(())
}

#[test]
fn test_engineered_rows_match_manual_encoding() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_synthetic_csv(dir.path(), 80)?;
    let output = dir.path().join("artifacts");
    run_training(&small_config(&input, &output))?;

    let store = ArtifactStore::load(&ArtifactPaths::in_dir(&output))?;
    let engineered = Dataset::from_csv(output.join("engineered.csv"))?;
    let raw = RawDataset::from_csv(&input)?;
    assert_eq!(engineered.len(), raw.len());

    let encoder = store.encoder(UnknownCategoryPolicy::Reject);
    for (i, car) in raw.records.iter().enumerate() {
        let manual = json!({
            "car_name": car.name,
            "year": car.year,
            "km": car.km_driven,
            "engine": car.engine,
            "power": car.max_power,
            "mileage": car.mileage,
            "seats": car.seats,
            "fuel": car.fuel,
            "transmission": car.transmission,
            "seller": car.seller_type,
            "owner": car.owner,
        });
        let from_row = encoder.encode_from_row(&engineered, i as i64)?;
        let from_manual = encoder.encode_from_manual(&manual)?;
        assert_eq!(from_row, from_manual, "row {i} diverged");

        let row_price = store.predictor().predict(&from_row)?.price;
        let manual_price = store.predictor().predict(&from_manual)?.price;
        assert_eq!(row_price, manual_price);
    }
    Ok(())
}

#[test]
fn test_deterministic_training() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_synthetic_csv(dir.path(), 100)?;
    let out1 = dir.path().join("run1");
    let out2 = dir.path().join("run2");

    let report1 = run_training(&small_config(&input, &out1))?;
    let report2 = run_training(&small_config(&input, &out2))?;
    assert_eq!(report1.model_hash, report2.model_hash);

    let paths1 = ArtifactPaths::in_dir(&out1);
    let paths2 = ArtifactPaths::in_dir(&out2);
    assert_eq!(std::fs::read(&paths1.model)?, std::fs::read(&paths2.model)?);
    assert_eq!(
        std::fs::read_to_string(&paths1.features)?,
        std::fs::read_to_string(&paths2.features)?
    );
    assert_eq!(
        std::fs::read_to_string(&paths1.scaler)?,
        std::fs::read_to_string(&paths2.scaler)?
    );
    Ok(())
}

#[test]
fn test_evaluation_reports_worst_predictions() -> Result<()> {
    let dir = TempDir::new()?;
    let input = write_synthetic_csv(dir.path(), 100)?;
    let output = dir.path().join("artifacts");
    run_training(&small_config(&input, &output))?;

    let report = run_evaluation(&output, &input, 5)?;
    assert_eq!(report.rows, 100);
    assert_eq!(report.worst.len(), 5);
    assert!(report
        .worst
        .windows(2)
        .all(|w| w[0].abs_error >= w[1].abs_error));
    assert!(report.metrics.r2 > 0.5);

    let residuals = report.residuals;
    assert!(residuals.min <= residuals.mean && residuals.mean <= residuals.max);
    assert!(residuals.std >= 0.0);
    assert_eq!(
        residuals.min.abs().max(residuals.max.abs()),
        report.worst[0].abs_error
    );
    Ok(())
}
