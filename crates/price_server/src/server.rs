//! HTTP/JSON facade over the price core
//!
//! Every route is served at the root and again under `/api`. Successful
//! payloads carry `"success": true`; failures are `{"success": false,
//! "error": "..."}` with a status code matching the error class.

use anyhow::{Context, Result};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use carprice_core::schema::{CategoricalAttribute, TARGET_COLUMN};
use carprice_core::{
    ArtifactStore, Cell, Dataset, DegradedArtifact, EncodeError, ModelSummary, PricePrediction,
    TransformMeta,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::catalog::{self, ColumnRange, DatasetStats};
use crate::state::{AppState, RefreshError, SharedState};

const INTERNAL_ERROR: &str = "internal server error";

/// Start the HTTP server and run until Ctrl-C
pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let shared = Arc::new(state);
    let app = build_router(shared);
    let listener = bind_listener(addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {addr}"))
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => {
            warn!("Failed to listen for shutdown signal: {}", err);
            std::future::pending::<()>().await;
        }
    }
}

fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(handle_health))
        .route("/predict-row", post(handle_predict_row))
        .route("/predict-manual", post(handle_predict_manual))
        .route("/car-names", get(handle_car_names))
        .route("/car-info", get(handle_car_info))
        .route("/model-info", get(handle_model_info))
        .route("/database/stats", get(handle_database_stats))
        .route("/database/cars", get(handle_database_cars))
        .route("/database/car/:index", get(handle_database_car))
        .route("/database/search", get(handle_database_search))
        .route("/database/range/:column", get(handle_database_range))
        .route("/database/refresh", post(handle_database_refresh))
}

pub fn build_router(state: SharedState) -> Router {
    let routes = api_routes();
    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .fallback(handle_not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
    }

    fn service_unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            success: false,
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

impl From<EncodeError> for ApiError {
    fn from(err: EncodeError) -> Self {
        debug!("Rejected input: {}", err);
        ApiError::bad_request(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(format!("invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(format!("invalid query: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(format!("invalid path: {}", rejection.body_text()))
    }
}

fn require_model(state: &AppState) -> Result<Arc<ArtifactStore>, ApiError> {
    state
        .model
        .store()
        .cloned()
        .ok_or_else(|| ApiError::service_unavailable("model not loaded"))
}

fn require_dataset(state: &AppState) -> Result<Arc<Dataset>, ApiError> {
    state
        .dataset
        .snapshot()
        .ok_or_else(|| ApiError::service_unavailable("dataset not loaded"))
}

fn run_prediction(store: &ArtifactStore, features: &[f64]) -> Result<PricePrediction, ApiError> {
    store.predictor().predict(features).map_err(|err| {
        error!("Prediction contract violation: {}", err);
        ApiError::internal()
    })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    data_loaded: bool,
    degraded_artifacts: Vec<DegradedArtifact>,
    timestamp: String,
    uptime_secs: u64,
    req_total: usize,
}

async fn handle_health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let req_total = state.record_request();
    let (status, code, degraded_artifacts) = match state.model.store() {
        Some(store) if store.is_degraded() => {
            ("degraded", StatusCode::OK, store.degraded().to_vec())
        }
        Some(_) => ("healthy", StatusCode::OK, Vec::new()),
        None => ("unhealthy", StatusCode::SERVICE_UNAVAILABLE, Vec::new()),
    };

    let response = HealthResponse {
        status,
        model_loaded: state.model.is_ready(),
        data_loaded: state.dataset.is_loaded(),
        degraded_artifacts,
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: state.uptime_seconds(),
        req_total,
    };
    (code, Json(response))
}

#[derive(Debug, Deserialize)]
struct PredictRowRequest {
    #[serde(default)]
    row_index: i64,
}

#[derive(Debug, Serialize)]
struct PredictRowResponse {
    success: bool,
    predicted_price: f64,
    real_price: f64,
    row_index: i64,
}

async fn handle_predict_row(
    State(state): State<SharedState>,
    payload: Result<Json<PredictRowRequest>, JsonRejection>,
) -> Result<Json<PredictRowResponse>, ApiError> {
    state.record_request();
    let store = require_model(&state)?;
    let Json(request) = payload?;
    let dataset = require_dataset(&state)?;

    let features = store
        .encoder(state.policy)
        .encode_from_row(&dataset, request.row_index)?;
    let prediction = run_prediction(&store, &features)?;

    // encode_from_row has already range-checked the index
    let real_price = usize::try_from(request.row_index)
        .ok()
        .and_then(|row| dataset.value(row, TARGET_COLUMN))
        .and_then(Cell::as_number)
        .unwrap_or(0.0);

    debug!(
        "Row {} predicted {:.2} (real {:.2})",
        request.row_index, prediction.price, real_price
    );
    Ok(Json(PredictRowResponse {
        success: true,
        predicted_price: prediction.price,
        real_price,
        row_index: request.row_index,
    }))
}

#[derive(Debug, Serialize)]
struct PredictManualResponse {
    success: bool,
    predicted_price: f64,
}

async fn handle_predict_manual(
    State(state): State<SharedState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictManualResponse>, ApiError> {
    state.record_request();
    let store = require_model(&state)?;
    let Json(record) = payload?;

    let features = store.encoder(state.policy).encode_from_manual(&record)?;
    let prediction = run_prediction(&store, &features)?;

    debug!("Manual input predicted {:.2}", prediction.price);
    Ok(Json(PredictManualResponse {
        success: true,
        predicted_price: prediction.price,
    }))
}

#[derive(Debug, Serialize)]
struct CarNamesResponse {
    success: bool,
    names: Vec<String>,
    count: usize,
}

async fn handle_car_names(
    State(state): State<SharedState>,
) -> Result<Json<CarNamesResponse>, ApiError> {
    state.record_request();
    let store = require_model(&state)?;
    // BTreeMap keys are already sorted
    let names: Vec<String> = store.name_codes().names().map(str::to_string).collect();
    Ok(Json(CarNamesResponse {
        success: true,
        count: names.len(),
        names,
    }))
}

#[derive(Debug, Serialize)]
struct CarInfo {
    fuel_types: Vec<String>,
    seller_types: Vec<String>,
    transmissions: Vec<String>,
    owner_counts: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CarInfoResponse {
    success: bool,
    info: CarInfo,
}

async fn handle_car_info(State(state): State<SharedState>) -> Result<Json<CarInfoResponse>, ApiError> {
    state.record_request();
    let store = require_model(&state)?;
    let levels = store.levels();
    let info = CarInfo {
        fuel_types: levels.levels(CategoricalAttribute::Fuel).to_vec(),
        seller_types: levels.levels(CategoricalAttribute::SellerType).to_vec(),
        transmissions: levels.levels(CategoricalAttribute::Transmission).to_vec(),
        owner_counts: levels.levels(CategoricalAttribute::Owner).to_vec(),
    };
    Ok(Json(CarInfoResponse {
        success: true,
        info,
    }))
}

#[derive(Debug, Serialize)]
struct ModelInfoResponse {
    success: bool,
    info: TransformMeta,
    model: ModelSummary,
}

async fn handle_model_info(
    State(state): State<SharedState>,
) -> Result<Json<ModelInfoResponse>, ApiError> {
    state.record_request();
    let store = require_model(&state)?;
    Ok(Json(ModelInfoResponse {
        success: true,
        info: store.meta().clone(),
        model: store.model_summary(),
    }))
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    success: bool,
    stats: DatasetStats,
}

async fn handle_database_stats(
    State(state): State<SharedState>,
) -> Result<Json<StatsResponse>, ApiError> {
    state.record_request();
    let dataset = require_dataset(&state)?;
    Ok(Json(StatsResponse {
        success: true,
        stats: catalog::stats(&dataset),
    }))
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    limit: Option<usize>,
    #[serde(default)]
    offset: usize,
}

#[derive(Debug, Serialize)]
struct PageResponse {
    success: bool,
    #[serde(flatten)]
    page: catalog::Page,
}

async fn handle_database_cars(
    State(state): State<SharedState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PageResponse>, ApiError> {
    state.record_request();
    let dataset = require_dataset(&state)?;
    let Query(query) = query?;
    Ok(Json(PageResponse {
        success: true,
        page: catalog::page(&dataset, query.limit, query.offset),
    }))
}

#[derive(Debug, Serialize)]
struct CarResponse {
    success: bool,
    car: Map<String, Value>,
    index: usize,
}

async fn handle_database_car(
    State(state): State<SharedState>,
    index: Result<Path<usize>, PathRejection>,
) -> Result<Json<CarResponse>, ApiError> {
    state.record_request();
    let dataset = require_dataset(&state)?;
    let Path(index) = index?;
    let car = catalog::row_object(&dataset, index)
        .ok_or_else(|| ApiError::not_found(format!("car {index} not found")))?;
    Ok(Json(CarResponse {
        success: true,
        car,
        index,
    }))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    column: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    success: bool,
    results: Vec<Map<String, Value>>,
    count: usize,
}

async fn handle_database_search(
    State(state): State<SharedState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    state.record_request();
    let dataset = require_dataset(&state)?;
    let Query(query) = query?;
    let needle = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("search query 'q' is required"))?;

    let results = catalog::search(&dataset, needle, query.column.as_deref());
    Ok(Json(SearchResponse {
        success: true,
        count: results.len(),
        results,
    }))
}

#[derive(Debug, Serialize)]
struct RangeResponse {
    success: bool,
    column: String,
    range: ColumnRange,
}

async fn handle_database_range(
    State(state): State<SharedState>,
    Path(column): Path<String>,
) -> Result<Json<RangeResponse>, ApiError> {
    state.record_request();
    let dataset = require_dataset(&state)?;
    let range = catalog::range(&dataset, &column)
        .ok_or_else(|| ApiError::not_found(format!("no numeric column '{column}'")))?;
    Ok(Json(RangeResponse {
        success: true,
        column,
        range,
    }))
}

#[derive(Debug, Serialize)]
struct RefreshResponse {
    success: bool,
    message: &'static str,
    total_cars: usize,
}

async fn handle_database_refresh(
    State(state): State<SharedState>,
) -> Result<Json<RefreshResponse>, ApiError> {
    state.record_request();
    match state.dataset.refresh().await {
        Ok(dataset) => Ok(Json(RefreshResponse {
            success: true,
            message: "dataset refreshed",
            total_cars: dataset.len(),
        })),
        Err(RefreshError::NotConfigured) => {
            Err(ApiError::service_unavailable("no dataset path is configured"))
        }
        Err(err) => {
            error!("Dataset refresh failed: {}", err);
            Err(ApiError::internal())
        }
    }
}

async fn handle_not_found(State(state): State<SharedState>) -> ApiError {
    state.record_request();
    ApiError::not_found("endpoint not found")
}
