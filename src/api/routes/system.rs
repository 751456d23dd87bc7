use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::{DbStats, LeaderboardChoice};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
    })
}

pub async fn db_stats(State(state): State<AppState>) -> Result<Json<DbStats>, ApiError> {
    let stats = state.read(|store| Ok(store.db_stats()?)).await?;
    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
pub struct LeaderboardListResponse {
    pub leaderboards: Vec<LeaderboardChoice>,
}

/// Ladders that have history, for picking the active one.
pub async fn list_leaderboards(
    State(state): State<AppState>,
) -> Result<Json<LeaderboardListResponse>, ApiError> {
    let leaderboards = state
        .read(|store| Ok(store.available_leaderboards()?))
        .await?;
    Ok(Json(LeaderboardListResponse { leaderboards }))
}
