use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::calculate::LeaderboardService;
use crate::models::{ComparisonResult, LeaderboardEntry, PlayerStatsResult, RatingChartResult};

fn player_not_found(battle_tag: &str) -> ApiError {
    ApiError::NotFound(format!("player {}", battle_tag))
}

/// Rating statistics; unranked players answer 200 with `status: unranked`.
pub async fn stats(
    State(state): State<AppState>,
    Path((leaderboard, region, battle_tag)): Path<(String, String, String)>,
) -> Result<Json<PlayerStatsResult>, ApiError> {
    let result = state
        .read(move |store| {
            Ok(LeaderboardService::new(store).player_stats(&leaderboard, &region, &battle_tag)?)
        })
        .await?;
    match result {
        PlayerStatsResult::NotFound { battle_tag } => Err(player_not_found(&battle_tag)),
        result => Ok(Json(result)),
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub battle_tag: String,
    pub history: Vec<LeaderboardEntry>,
}

/// Most recent rows, newest first, including rows where the player was off the ladder.
pub async fn history(
    State(state): State<AppState>,
    Path((leaderboard, region, battle_tag)): Path<(String, String, String)>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let tag = battle_tag.clone();
    let history = state
        .read(move |store| {
            Ok(LeaderboardService::new(store).player_history(&leaderboard, &region, &tag)?)
        })
        .await?
        .ok_or_else(|| player_not_found(&battle_tag))?;

    Ok(Json(HistoryResponse {
        battle_tag: history
            .first()
            .map(|e| e.battle_tag.clone())
            .unwrap_or(battle_tag),
        history,
    }))
}

pub async fn chart(
    State(state): State<AppState>,
    Path((leaderboard, region, battle_tag)): Path<(String, String, String)>,
) -> Result<Json<RatingChartResult>, ApiError> {
    let result = state
        .read(move |store| {
            Ok(LeaderboardService::new(store).rating_chart(&leaderboard, &region, &battle_tag)?)
        })
        .await?;
    match result {
        RatingChartResult::NotFound { battle_tag } => Err(player_not_found(&battle_tag)),
        result => Ok(Json(result)),
    }
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub a: Option<String>,
    pub b: Option<String>,
}

/// Rating series of two players over the last 30 days.
pub async fn compare(
    State(state): State<AppState>,
    Path((leaderboard, region)): Path<(String, String)>,
    Query(params): Query<CompareParams>,
) -> Result<Json<ComparisonResult>, ApiError> {
    let (Some(a), Some(b)) = (params.a, params.b) else {
        return Err(ApiError::BadRequest(
            "both `a` and `b` battle tags are required".to_string(),
        ));
    };

    let result = state
        .read(move |store| {
            Ok(LeaderboardService::new(store).compare(
                &leaderboard,
                &region,
                (a.as_str(), b.as_str()),
                Utc::now(),
            )?)
        })
        .await?;
    match result {
        ComparisonResult::PlayerNotFound { battle_tag } => Err(player_not_found(&battle_tag)),
        result => Ok(Json(result)),
    }
}
