//! Derived statistics DTOs returned to presentation code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LeaderboardId, PlayerId};

/// Who a statistics result is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub player_id: PlayerId,
    pub battle_tag: String,
    pub region: String,
}

/// Rating statistics over a player's rated history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub battle_tag: String,
    pub peak_rating: i32,
    pub lowest_rating: i32,
    pub current_rating: i32,
    pub average_rating: i32,
    pub biggest_daily_gain: i32,
    pub biggest_daily_loss: i32,
    pub days_in_ranking: u32,
    pub days_outside_ranking: u32,
}

/// Outcome of a player statistics lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlayerStatsResult {
    /// The player has at least one rated row.
    Found(PlayerStats),

    /// The player is known but has no rated rows in scope.
    Unranked(PlayerIdentity),

    NotFound { battle_tag: String },
}

/// A player whose rating moved inside the trailing 24 hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMover {
    pub player_id: PlayerId,
    pub battle_tag: String,
    pub change: i32,
    pub current_rating: i32,
}

/// One row of a ladder view or player history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: Option<i32>,
    pub battle_tag: String,
    pub rating: Option<i32>,
    pub scraped_at: DateTime<Utc>,
}

/// One point of a rating series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingPoint {
    pub timestamp: DateTime<Utc>,
    pub rating: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RatingChartResult {
    Ready {
        battle_tag: String,
        points: Vec<RatingPoint>,
    },
    InsufficientHistory {
        battle_tag: String,
        points: usize,
    },
    NotFound {
        battle_tag: String,
    },
}

/// Rating series of two players over the same window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerComparison {
    pub battle_tag_1: String,
    pub history_1: Vec<RatingPoint>,
    pub battle_tag_2: String,
    pub history_2: Vec<RatingPoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComparisonResult {
    Ready(PlayerComparison),
    InsufficientData {
        battle_tag_1: String,
        points_1: usize,
        battle_tag_2: String,
        points_2: usize,
    },
    PlayerNotFound {
        battle_tag: String,
    },
}

/// A (leaderboard, region) pair that has history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardChoice {
    pub leaderboard_id: LeaderboardId,
    pub api_id: String,
    pub name: String,
    pub region: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbStats {
    pub player_count: u64,
    pub season_count: u64,
    pub leaderboard_count: u64,
    pub history_count: u64,
}
