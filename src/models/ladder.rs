//! Persisted ladder entities.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{LeaderboardId, PlayerId, SeasonId};

/// A ranked account. Unique on (battle tag, region).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub battle_tag: String,
    pub region: String,
}

/// A ladder season as numbered by the upstream API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub id: SeasonId,
    pub blizzard_id: i64,
    pub name: String,
}

impl Season {
    /// Display name given to seasons first observed in an API response.
    pub fn display_name(blizzard_id: i64) -> String {
        format!("Battlegrounds Season {}", blizzard_id)
    }
}

/// A leaderboard such as `battlegrounds` or `battlegroundsduo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub id: LeaderboardId,
    pub api_id: String,
    pub name: String,
}

/// One observation of a player on a leaderboard at a scrape instant.
///
/// Rows with neither rank nor rating are sentinels: the player was tracked
/// for this leaderboard and season but missing from the live snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankHistory {
    pub id: i64,
    pub scraped_at: DateTime<Utc>,
    pub rank: Option<i32>,
    pub rating: Option<i32>,
    pub player_id: PlayerId,
    pub season_id: SeasonId,
    pub leaderboard_id: LeaderboardId,
}

impl RankHistory {
    pub fn is_sentinel(&self) -> bool {
        self.rank.is_none() && self.rating.is_none()
    }

    /// UTC calendar date of the scrape.
    pub fn scrape_date(&self) -> NaiveDate {
        self.scraped_at.date_naive()
    }
}
