//! Coverage API routes
//!
//! `POST /coverage/analyze` and `POST /coverage/analyze-issue` plus cache
//! admin. Handlers take the JSON body as a `Result` so malformed payloads
//! map onto the same `{success:false, error}` body as validation errors.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use coverage_engine::issue::{IssueAnalysis, IssueRequest};
use coverage_engine::{CacheStats, CoverageEngine, LocationCoverage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppError;

pub type SharedEngine = Arc<CoverageEngine>;

/// Build coverage routes with the shared engine
pub fn coverage_router(engine: SharedEngine) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/analyze-issue", post(analyze_issue))
        .route("/cache/stats", get(cache_stats))
        .route("/cache/clear", post(clear_cache))
        .with_state(engine)
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

/// Success envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

async fn analyze(
    State(engine): State<SharedEngine>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LocationCoverage>>, AppError> {
    let Json(req) = payload?;
    let coverage = engine
        .analyze(req.lat, req.lng, req.address, req.provider.as_deref())
        .await?;
    Ok(ApiResponse::ok(coverage))
}

async fn analyze_issue(
    State(engine): State<SharedEngine>,
    payload: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<IssueAnalysis>>, AppError> {
    let Json(req) = payload?;
    let analysis = engine.analyze_issue(&req).await?;
    Ok(ApiResponse::ok(analysis))
}

async fn cache_stats(State(engine): State<SharedEngine>) -> Json<ApiResponse<CacheStats>> {
    ApiResponse::ok(engine.cache_stats().await)
}

async fn clear_cache(State(engine): State<SharedEngine>) -> Json<ApiResponse<CacheStats>> {
    engine.clear_cache().await;
    ApiResponse::ok(engine.cache_stats().await)
}
