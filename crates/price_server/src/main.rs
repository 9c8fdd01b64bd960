//! Carprice prediction server

use anyhow::Result;
use carprice_core::UnknownCategoryPolicy;
use carprice_server::{start_server, AppState, ConfigOverrides, LogFormat, ServerConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "carprice-server")]
#[command(author = "Carprice Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve used-car price predictions over HTTP", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding the trained artifact set
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// Engineered dataset for row-mode prediction and the catalog
    #[arg(long)]
    dataset: Option<PathBuf>,

    #[arg(long)]
    log_level: Option<String>,

    /// compact or pretty
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// ignore or reject
    #[arg(long)]
    unknown_category_policy: Option<UnknownCategoryPolicy>,

    /// Exit instead of serving unhealthy when artifacts fail to load
    #[arg(long)]
    require_artifacts: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            artifacts_dir: self.artifacts_dir.clone(),
            dataset_path: self.dataset.clone(),
            log_level: self.log_level.clone(),
            log_format: self.log_format,
            unknown_category_policy: self.unknown_category_policy,
            require_artifacts: self.require_artifacts,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    config.apply_overrides(cli.overrides());
    config.validate()?;

    init_logging(&config);

    info!("Carprice Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Artifacts: {}", config.artifacts_dir.display());
    match &config.dataset_path {
        Some(path) => info!("Dataset: {}", path.display()),
        None => info!("Dataset: disabled"),
    }
    info!("Unknown categories: {}", config.unknown_category_policy);

    let state = AppState::initialize(&config).await?;
    start_server(state, &config.listen_addr()).await
}

fn init_logging(config: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
    }
}
