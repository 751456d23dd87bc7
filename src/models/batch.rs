//! The write unit produced by reconciliation and committed atomically.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{LeaderboardId, PlayerId, SeasonId};

/// Season the batch belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SeasonRef {
    Existing(SeasonId),
    New { blizzard_id: i64, name: String },
}

/// Leaderboard the batch belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LeaderboardRef {
    Existing(LeaderboardId),
    New { api_id: String, name: String },
}

/// Player a history row points at. `New` indexes into `HistoryBatch::new_players`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayerRef {
    Existing(PlayerId),
    New(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPlayer {
    pub battle_tag: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewHistoryRow {
    pub player: PlayerRef,
    pub rank: Option<i32>,
    pub rating: Option<i32>,
}

impl NewHistoryRow {
    pub fn live(player: PlayerRef, rank: i32, rating: i32) -> Self {
        Self {
            player,
            rank: Some(rank),
            rating: Some(rating),
        }
    }

    pub fn sentinel(player: PlayerRef) -> Self {
        Self {
            player,
            rank: None,
            rating: None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.rank.is_none() && self.rating.is_none()
    }
}

/// Everything one scrape target writes in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryBatch {
    pub region: String,
    pub scraped_at: DateTime<Utc>,
    pub season: SeasonRef,
    pub leaderboard: LeaderboardRef,
    pub new_players: Vec<NewPlayer>,
    pub rows: Vec<NewHistoryRow>,
}

impl HistoryBatch {
    pub fn live_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_sentinel()).count()
    }

    pub fn sentinel_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_sentinel()).count()
    }
}

/// Result of committing a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub season_id: SeasonId,
    pub leaderboard_id: LeaderboardId,
    pub players_created: usize,
    pub rows_inserted: usize,
    pub sentinel_rows: usize,
}
