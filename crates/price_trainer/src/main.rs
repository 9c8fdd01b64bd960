//! Carprice trainer CLI
//!
//! `train` builds an artifact set from a raw CSV; `evaluate` scores an
//! existing artifact set against one.

use anyhow::{Context, Result};
use carprice_trainer::{run_evaluation, run_training, PipelineConfig, TrainingParams};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "carprice-train")]
#[command(author = "Carprice Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic GBDT trainer for used-car prices", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model and write the artifact set
    Train(TrainArgs),
    /// Score an existing artifact set against a raw CSV
    Evaluate(EvaluateArgs),
}

#[derive(clap::Args, Debug)]
struct TrainArgs {
    /// Raw CSV (name, year, selling_price, km_driven, ...)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the artifact set
    #[arg(short, long, default_value = "artifacts")]
    output: PathBuf,

    /// Engineered dataset for row-mode serving
    #[arg(long)]
    engineered_csv: Option<PathBuf>,

    /// Maximum boosting rounds
    #[arg(long, default_value = "1000")]
    rounds: usize,

    /// Shrinkage per round
    #[arg(long, default_value = "0.05")]
    learning_rate: f64,

    /// Maximum tree depth
    #[arg(long, default_value = "6")]
    max_depth: usize,

    /// Minimum samples per leaf
    #[arg(long, default_value = "20")]
    min_samples_leaf: usize,

    /// L2 penalty on leaf values
    #[arg(long, default_value = "0.0")]
    l2: f64,

    /// Rounds without validation improvement before stopping (0 disables)
    #[arg(long, default_value = "50")]
    early_stopping_rounds: usize,

    /// Random seed for the train/test shuffle
    #[arg(long, default_value = "42")]
    seed: i64,

    /// Fraction of rows held out for validation
    #[arg(long, default_value = "0.2")]
    test_fraction: f64,

    /// Year used to derive car_age
    #[arg(long, default_value = "2025")]
    reference_year: i32,

    /// Also write the training report as JSON
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct EvaluateArgs {
    /// Artifact directory written by `train`
    #[arg(short, long, default_value = "artifacts")]
    artifacts: PathBuf,

    /// Raw CSV to score
    #[arg(short, long)]
    input: PathBuf,

    /// Number of worst predictions to list
    #[arg(long, default_value = "10")]
    worst: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Carprice GBDT Trainer v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Train(args) => train(args),
        Command::Evaluate(args) => evaluate(args),
    }
}

fn train(args: TrainArgs) -> Result<()> {
    let config = PipelineConfig {
        input: args.input,
        output_dir: args.output,
        engineered_csv: args.engineered_csv,
        params: TrainingParams {
            num_rounds: args.rounds,
            learning_rate: args.learning_rate,
            max_depth: args.max_depth,
            min_samples_leaf: args.min_samples_leaf,
            l2_regularization: args.l2,
            early_stopping_rounds: args.early_stopping_rounds,
        },
        seed: args.seed,
        test_fraction: args.test_fraction,
        reference_year: args.reference_year,
    };

    info!("Training configuration:");
    info!("  Rounds: {}", config.params.num_rounds);
    info!("  Learning rate: {}", config.params.learning_rate);
    info!("  Max depth: {}", config.params.max_depth);
    info!("  Min samples per leaf: {}", config.params.min_samples_leaf);
    info!("  Early stopping: {}", config.params.early_stopping_rounds);

    let report = run_training(&config)?;

    info!("✓ Training completed successfully");
    info!("  Trees: {} (best iteration {:?})", report.num_trees, report.best_iteration);
    info!("  Model hash: {}", report.model_hash);

    if let Some(path) = args.report {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("  Report: {}", path.display());
    }
    Ok(())
}

fn evaluate(args: EvaluateArgs) -> Result<()> {
    let report = run_evaluation(&args.artifacts, &args.input, args.worst)?;

    info!("Evaluated {} cars", report.rows);
    info!("Worst {} predictions:", report.worst.len());
    for entry in &report.worst {
        info!(
            "  #{} {}: actual {:.0}, predicted {:.0} (error {:.0})",
            entry.index, entry.name, entry.actual, entry.predicted, entry.abs_error
        );
    }
    Ok(())
}
