//! Snapshot endpoints
//!
//! - `GET /state`: the full coordinator snapshot with the latest counters
//! - `GET /current`: the current song, 404 when none is resolved
//! - `GET /upcoming`: predicted upcoming songs, nearest first

use axum::{extract::State, routing::get, Json, Router};

use crate::error::{ApiError, ApiResult};
use crate::models::{CoordinatorState, ResolvedSong};
use crate::AppState;

/// GET /state
pub async fn get_state(State(state): State<AppState>) -> Json<CoordinatorState> {
    let mut snapshot = CoordinatorState::clone(&state.snapshot());
    snapshot.diagnostics = state.diagnostics();
    Json(snapshot)
}

/// GET /current
pub async fn get_current(State(state): State<AppState>) -> ApiResult<Json<ResolvedSong>> {
    state
        .snapshot()
        .current
        .clone()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no song is currently resolved".to_string()))
}

/// GET /upcoming
pub async fn get_upcoming(State(state): State<AppState>) -> Json<Vec<ResolvedSong>> {
    Json(state.snapshot().upcoming.clone())
}

pub fn state_routes() -> Router<AppState> {
    Router::new()
        .route("/state", get(get_state))
        .route("/current", get(get_current))
        .route("/upcoming", get(get_upcoming))
}
