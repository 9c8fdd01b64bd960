//! Shared server state
//!
//! The artifact store is loaded once and shared read-only. The canonical
//! dataset is the only thing that changes at runtime: a refresh parses the
//! file on the blocking pool and swaps in a new snapshot.

use carprice_core::{ArtifactStore, Dataset, DatasetError, UnknownCategoryPolicy};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ServerConfig;

/// Outcome of the startup artifact load
#[derive(Debug, Clone)]
pub enum ModelState {
    Ready(Arc<ArtifactStore>),
    /// Mandatory artifacts failed; the reason is logged, never returned to clients
    Unavailable { reason: String },
}

impl ModelState {
    pub fn store(&self) -> Option<&Arc<ArtifactStore>> {
        match self {
            ModelState::Ready(store) => Some(store),
            ModelState::Unavailable { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ModelState::Ready(_))
    }
}

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("no dataset path is configured")]
    NotConfigured,

    #[error("failed to load dataset: {0}")]
    Load(#[from] DatasetError),

    #[error("dataset load task failed: {0}")]
    Task(String),
}

/// Current dataset snapshot plus the file it is reloaded from
#[derive(Debug, Default)]
pub struct DatasetStore {
    path: Option<PathBuf>,
    current: RwLock<Option<Arc<Dataset>>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl DatasetStore {
    pub fn empty(path: Option<PathBuf>) -> Self {
        Self {
            path,
            current: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_dataset(path: Option<PathBuf>, dataset: Dataset) -> Self {
        Self {
            path,
            current: RwLock::new(Some(Arc::new(dataset))),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Clone of the current snapshot; never a partially loaded dataset
    pub fn snapshot(&self) -> Option<Arc<Dataset>> {
        self.current.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    /// Re-read the dataset file. Concurrent callers queue behind one another;
    /// on failure the previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<Arc<Dataset>, RefreshError> {
        let path = self.path.clone().ok_or(RefreshError::NotConfigured)?;
        let _guard = self.refresh_lock.lock().await;

        let dataset = tokio::task::spawn_blocking(move || Dataset::from_csv(&path))
            .await
            .map_err(|err| RefreshError::Task(err.to_string()))??;

        let dataset = Arc::new(dataset);
        *self.current.write() = Some(dataset.clone());
        info!("Dataset refreshed: {} rows", dataset.len());
        Ok(dataset)
    }
}

#[derive(Debug)]
pub struct AppState {
    pub model: ModelState,
    pub dataset: DatasetStore,
    pub policy: UnknownCategoryPolicy,
    start_time: Instant,
    req_count: AtomicUsize,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(model: ModelState, dataset: DatasetStore, policy: UnknownCategoryPolicy) -> Self {
        Self {
            model,
            dataset,
            policy,
            start_time: Instant::now(),
            req_count: AtomicUsize::new(0),
        }
    }

    /// Load artifacts and the dataset described by `config`.
    ///
    /// A failed artifact load leaves the model unavailable unless
    /// `require_artifacts` is set, in which case it is returned as an error.
    /// A missing or unreadable dataset only disables row mode and the catalog.
    pub async fn initialize(config: &ServerConfig) -> anyhow::Result<Self> {
        let paths = config.artifact_paths();
        let loaded = tokio::task::spawn_blocking(move || ArtifactStore::load(&paths)).await?;

        let model = match loaded {
            Ok(store) => {
                for degraded in store.degraded() {
                    warn!("Serving with degraded artifact: {}", degraded);
                }
                ModelState::Ready(Arc::new(store))
            }
            Err(err) if config.require_artifacts => {
                return Err(anyhow::Error::new(err).context(format!(
                    "Failed to load artifacts from {}",
                    config.artifacts_dir.display()
                )));
            }
            Err(err) => {
                warn!(
                    "Model unavailable, serving unhealthy: failed to load artifacts from {}: {}",
                    config.artifacts_dir.display(),
                    err
                );
                ModelState::Unavailable {
                    reason: err.to_string(),
                }
            }
        };

        let dataset = DatasetStore::empty(config.dataset_path.clone());
        match dataset.refresh().await {
            Ok(loaded) => info!("Loaded dataset with {} rows", loaded.len()),
            Err(RefreshError::NotConfigured) => info!("No dataset configured; row mode disabled"),
            Err(err) => warn!("Dataset unavailable, row mode disabled: {}", err),
        }

        Ok(Self::new(model, dataset, config.unknown_category_policy))
    }

    pub fn record_request(&self) -> usize {
        self.req_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn request_count(&self) -> usize {
        self.req_count.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
