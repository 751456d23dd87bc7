use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::{ApiError, Pagination, PaginationMeta};
use crate::calculate::LeaderboardService;
use crate::models::{DailyMover, LeaderboardEntry};

#[derive(Debug, Deserialize)]
pub struct EntriesParams {
    /// Keep only the top N ranks before paginating
    pub limit: Option<usize>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct EntriesResponse {
    pub leaderboard: String,
    pub region: String,
    pub scraped_at: Option<DateTime<Utc>>,
    pub entries: Vec<LeaderboardEntry>,
    pub pagination: PaginationMeta,
}

/// The ladder as of the latest scrape, sorted by rank.
pub async fn entries(
    State(state): State<AppState>,
    Path((leaderboard, region)): Path<(String, String)>,
    Query(params): Query<EntriesParams>,
) -> Result<Json<EntriesResponse>, ApiError> {
    if params.limit == Some(0) {
        return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
    }

    let (lb, rg) = (leaderboard.clone(), region.clone());
    let mut ladder = state
        .read(move |store| Ok(LeaderboardService::new(store).full_leaderboard(&lb, &rg)?))
        .await?;
    if let Some(limit) = params.limit {
        ladder.truncate(limit);
    }

    let pagination = Pagination::new(params.page, params.page_size);
    let meta = PaginationMeta::new(&pagination, ladder.len() as u32);

    Ok(Json(EntriesResponse {
        scraped_at: ladder.first().map(|e| e.scraped_at),
        entries: pagination.apply(&ladder),
        pagination: meta,
        leaderboard,
        region,
    }))
}

#[derive(Debug, Serialize)]
pub struct MoversResponse {
    pub leaderboard: String,
    pub region: String,
    pub movers: Vec<DailyMover>,
}

/// Biggest rating swings over the last 24 hours.
pub async fn movers(
    State(state): State<AppState>,
    Path((leaderboard, region)): Path<(String, String)>,
) -> Result<Json<MoversResponse>, ApiError> {
    let (lb, rg) = (leaderboard.clone(), region.clone());
    let movers = state
        .read(move |store| Ok(LeaderboardService::new(store).daily_movers(&lb, &rg, Utc::now())?))
        .await?;

    Ok(Json(MoversResponse {
        leaderboard,
        region,
        movers,
    }))
}
