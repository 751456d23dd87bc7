//! Upstream leaderboard API response shapes.

use serde::{Deserialize, Serialize};

/// One page of the community leaderboard endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardPage {
    pub season_id: i64,
    pub leaderboard: LeaderboardData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardData {
    #[serde(default)]
    pub rows: Vec<LeaderboardRow>,
    pub pagination: PageInfo,
}

/// A single ranked account on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub rank: i32,
    #[serde(rename = "accountid")]
    pub account_id: String,
    pub rating: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total_pages: u32,
}

impl LeaderboardPage {
    pub fn total_pages(&self) -> u32 {
        self.leaderboard.pagination.total_pages
    }
}
