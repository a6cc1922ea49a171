//! Resolution API Server
//!
//! HTTP surface over the resolution service: single and batch
//! resolution, reloads, hierarchy queries and metrics. Service calls may
//! touch the boundary loader, so every one runs on the blocking pool.

use crate::application::{ResolutionService, SnapshotInfo};
use crate::domain::entities::{ResolutionResult, Zone};
use crate::domain::error::BoundaryLoadError;
use crate::domain::value_objects::{Coordinate, ZoneLevel};
use crate::infrastructure::ShutdownController;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Largest accepted batch.
pub const MAX_BATCH: usize = 10_000;

/// Query string of `GET /api/v1/resolve`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ResolveQuery {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<ResolutionResult>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ZonesResponse {
    pub level: ZoneLevel,
    pub zones: Vec<Zone>,
    pub total: usize,
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub snapshot: Option<SnapshotInfo>,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub reloaded: bool,
    pub snapshot_version: u64,
}

/// Handler failure mapped onto an HTTP status and a JSON error body.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// No boundary snapshot is available
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// API Server state.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ResolutionService>,
    pub shutdown: ShutdownController,
}

impl ApiState {
    pub fn new(service: Arc<ResolutionService>, shutdown: ShutdownController) -> Self {
        Self { service, shutdown }
    }

    /// Run `f` against the service on the blocking pool, tracked as
    /// in-flight work for shutdown draining.
    async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&ResolutionService) -> T + Send + 'static,
        T: Send + 'static,
    {
        let service = self.service.clone();
        let guard = self.shutdown.work_guard();
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            f(&service)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("resolution task failed: {}", e)))
    }
}

/// Build the router with every route and request tracing.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/resolve", get(resolve_handler))
        .route("/api/v1/resolve/batch", post(resolve_batch_handler))
        .route("/api/v1/reload", post(reload_handler))
        .route("/api/v1/zones/:level", get(zones_handler))
        .route("/api/v1/zones/:level/:code", get(zone_handler))
        .route(
            "/api/v1/police-zones/:code/districts",
            get(police_zone_districts_handler),
        )
        .route("/api/v1/districts/:code/blocks", get(district_blocks_handler))
        .route(
            "/api/v1/governorates/:code/districts",
            get(governorate_districts_handler),
        )
        .route("/api/v1/unmapped-districts", get(unmapped_districts_handler))
        .route("/api/v1/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct ApiServer {
    listen_addr: String,
    state: ApiState,
}

impl ApiServer {
    pub fn new(
        listen_addr: String,
        service: Arc<ResolutionService>,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            listen_addr,
            state: ApiState::new(service, shutdown),
        }
    }

    pub fn state(&self) -> ApiState {
        self.state.clone()
    }

    /// Serve until shutdown is initiated, then let open requests finish.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let app = router(self.state.clone());

        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("resolution API listening on {}", self.listen_addr);

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;
        tracing::info!("resolution API stopped");
        Ok(())
    }
}

// Handler functions

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.service.snapshot_info();
    let (status, label) = if snapshot.is_some() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "no boundaries loaded")
    };
    let response = HealthResponse {
        status: label.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        snapshot,
    };
    (status, Json(response))
}

async fn resolve_handler(
    State(state): State<ApiState>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ResolutionResult>, ApiError> {
    let result = state
        .blocking(move |service| service.resolve(query.lat, query.lon))
        .await?
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    Ok(Json(result))
}

async fn resolve_batch_handler(
    State(state): State<ApiState>,
    Json(coords): Json<Vec<Coordinate>>,
) -> Result<Json<BatchResponse>, ApiError> {
    if coords.len() > MAX_BATCH {
        return Err(ApiError::BadRequest(format!(
            "batch of {} exceeds the limit of {}",
            coords.len(),
            MAX_BATCH
        )));
    }

    let results = state
        .blocking(move |service| service.resolve_batch(&coords))
        .await?
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    let total = results.len();
    Ok(Json(BatchResponse { results, total }))
}

async fn reload_handler(State(state): State<ApiState>) -> Result<Json<ReloadResponse>, ApiError> {
    match state.blocking(|service| service.reload()).await? {
        Ok(version) => {
            tracing::info!(version, "boundaries reloaded via API");
            Ok(Json(ReloadResponse {
                reloaded: true,
                snapshot_version: version,
            }))
        }
        Err(e) => Err(ApiError::Internal(format!(
            "reload failed, previous snapshot still serving: {}",
            e
        ))),
    }
}

fn parse_level(raw: &str) -> Result<ZoneLevel, ApiError> {
    ZoneLevel::parse(raw).ok_or_else(|| ApiError::BadRequest(format!("unknown zone level {}", raw)))
}

async fn zones_handler(
    State(state): State<ApiState>,
    Path(level): Path<String>,
) -> Result<Json<ZonesResponse>, ApiError> {
    let level = parse_level(&level)?;
    let zones = state
        .blocking(move |service| service.zones(level))
        .await?
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    let total = zones.len();
    Ok(Json(ZonesResponse {
        level,
        zones,
        total,
    }))
}

async fn zone_handler(
    State(state): State<ApiState>,
    Path((level, code)): Path<(String, String)>,
) -> Result<Json<Zone>, ApiError> {
    let level = parse_level(&level)?;
    let lookup = code.clone();
    state
        .blocking(move |service| service.zone(level, &lookup))
        .await?
        .map_err(|e| ApiError::Unavailable(e.to_string()))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("{} {} not found", level, code)))
}

type ChildQuery = fn(&ResolutionService, &str) -> Result<Option<Vec<Zone>>, BoundaryLoadError>;

/// Shared shape of the "children of a container" queries.
async fn children(
    state: &ApiState,
    level: ZoneLevel,
    child_level: ZoneLevel,
    code: String,
    query: ChildQuery,
) -> Result<Json<ZonesResponse>, ApiError> {
    let lookup = code.clone();
    let zones = state
        .blocking(move |service| query(service, &lookup))
        .await?
        .map_err(|e| ApiError::Unavailable(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("{} {} not found", level, code)))?;
    let total = zones.len();
    Ok(Json(ZonesResponse {
        level: child_level,
        zones,
        total,
    }))
}

async fn police_zone_districts_handler(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> Result<Json<ZonesResponse>, ApiError> {
    children(
        &state,
        ZoneLevel::PoliceZone,
        ZoneLevel::District,
        code,
        ResolutionService::districts_in_police_zone,
    )
    .await
}

async fn district_blocks_handler(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> Result<Json<ZonesResponse>, ApiError> {
    children(
        &state,
        ZoneLevel::District,
        ZoneLevel::Block,
        code,
        ResolutionService::blocks_in_district,
    )
    .await
}

async fn governorate_districts_handler(
    State(state): State<ApiState>,
    Path(code): Path<String>,
) -> Result<Json<ZonesResponse>, ApiError> {
    children(
        &state,
        ZoneLevel::Governorate,
        ZoneLevel::District,
        code,
        ResolutionService::districts_in_governorate,
    )
    .await
}

async fn unmapped_districts_handler(
    State(state): State<ApiState>,
) -> Result<Json<ZonesResponse>, ApiError> {
    let zones = state
        .blocking(|service| service.unmapped_districts())
        .await?
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    let total = zones.len();
    Ok(Json(ZonesResponse {
        level: ZoneLevel::District,
        zones,
        total,
    }))
}

async fn metrics_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.service.metrics())
}
