//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use t2k_common::time::seconds_since;

use crate::models::Diagnostics;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" while every scraper tier is failing
    pub status: String,
    pub module: String,
    pub version: String,
    pub git_hash: String,
    pub uptime_seconds: u64,
    pub chart_entries: usize,
    pub edition_year: i32,
    pub diagnostics: Diagnostics,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let diagnostics = state.diagnostics();
    let status = if diagnostics.consecutive_failures > 0 {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "t2k-tracker".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        uptime_seconds: seconds_since(state.startup_time),
        chart_entries: state.chart_entries,
        edition_year: state.edition_year,
        diagnostics,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
