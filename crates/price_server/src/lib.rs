//! Carprice Server - HTTP/JSON serving layer
//!
//! Wraps a loaded `carprice-core` artifact store and the engineered dataset
//! behind an axum router. See [`server::build_router`] for the route table.

pub mod catalog;
pub mod config;
pub mod server;
pub mod state;

pub use config::{ConfigOverrides, LogFormat, ServerConfig};
pub use server::{build_router, start_server, ApiError};
pub use state::{AppState, DatasetStore, ModelState, RefreshError, SharedState};
