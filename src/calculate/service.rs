//! Analytics queries scoped to one (leaderboard, region) ladder.
//!
//! Loads rows from the [`Store`] and hands them to the pure calculators.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use super::{
    calculate_comparison, calculate_daily_movers, calculate_latest_snapshot,
    calculate_player_stats, calculate_rating_chart, recent_entries, top_n, HISTORY_LIMIT,
    MOVERS_WINDOW_HOURS,
};
use crate::models::{
    ComparisonResult, DailyMover, DbStats, Leaderboard, LeaderboardChoice, LeaderboardEntry,
    Player, PlayerIdentity, PlayerStatsResult, RatingChartResult,
};
use crate::storage::{Store, StorageError};

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Unknown leaderboard: {0}")]
    UnknownLeaderboard(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Read-only analytics over a borrowed store.
pub struct LeaderboardService<'a> {
    store: &'a Store,
}

impl<'a> LeaderboardService<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    fn leaderboard(&self, api_id: &str) -> Result<Leaderboard, AnalyticsError> {
        self.store
            .find_leaderboard(api_id)?
            .ok_or_else(|| AnalyticsError::UnknownLeaderboard(api_id.to_string()))
    }

    fn player(&self, battle_tag: &str, region: &str) -> Result<Option<Player>, AnalyticsError> {
        Ok(self.store.find_player(battle_tag, region)?)
    }

    pub fn player_stats(
        &self,
        api_id: &str,
        region: &str,
        battle_tag: &str,
    ) -> Result<PlayerStatsResult, AnalyticsError> {
        let leaderboard = self.leaderboard(api_id)?;
        let Some(player) = self.player(battle_tag, region)? else {
            return Ok(PlayerStatsResult::NotFound {
                battle_tag: battle_tag.to_string(),
            });
        };

        let history = self.store.player_history(player.id, leaderboard.id)?;
        Ok(match calculate_player_stats(&player.battle_tag, &history) {
            Some(stats) => PlayerStatsResult::Found(stats),
            None => PlayerStatsResult::Unranked(PlayerIdentity {
                player_id: player.id,
                battle_tag: player.battle_tag,
                region: player.region,
            }),
        })
    }

    pub fn daily_movers(
        &self,
        api_id: &str,
        region: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<DailyMover>, AnalyticsError> {
        let leaderboard = self.leaderboard(api_id)?;
        let since = now - Duration::hours(MOVERS_WINDOW_HOURS);
        let recent = self.store.rated_history_since(leaderboard.id, region, since)?;
        Ok(calculate_daily_movers(&recent.rows, &recent.tags, now))
    }

    /// The whole ladder as of the latest scrape.
    pub fn full_leaderboard(&self, api_id: &str, region: &str) -> Result<Vec<LeaderboardEntry>, AnalyticsError> {
        let leaderboard = self.leaderboard(api_id)?;
        let latest = self.store.latest_ranked_rows(leaderboard.id, region)?;
        Ok(calculate_latest_snapshot(&latest.rows, &latest.tags))
    }

    pub fn top_players(&self, api_id: &str, region: &str, n: usize) -> Result<Vec<LeaderboardEntry>, AnalyticsError> {
        Ok(top_n(self.full_leaderboard(api_id, region)?, n))
    }

    /// Most recent rows of a player, or `None` for an unknown player.
    pub fn player_history(
        &self,
        api_id: &str,
        region: &str,
        battle_tag: &str,
    ) -> Result<Option<Vec<LeaderboardEntry>>, AnalyticsError> {
        let leaderboard = self.leaderboard(api_id)?;
        let Some(player) = self.player(battle_tag, region)? else {
            return Ok(None);
        };

        let history = self.store.player_history(player.id, leaderboard.id)?;
        Ok(Some(recent_entries(&player.battle_tag, &history, HISTORY_LIMIT)))
    }

    pub fn rating_chart(
        &self,
        api_id: &str,
        region: &str,
        battle_tag: &str,
    ) -> Result<RatingChartResult, AnalyticsError> {
        let leaderboard = self.leaderboard(api_id)?;
        let Some(player) = self.player(battle_tag, region)? else {
            return Ok(RatingChartResult::NotFound {
                battle_tag: battle_tag.to_string(),
            });
        };

        let history = self.store.player_history(player.id, leaderboard.id)?;
        Ok(calculate_rating_chart(&player.battle_tag, &history))
    }

    pub fn compare(
        &self,
        api_id: &str,
        region: &str,
        (tag_1, tag_2): (&str, &str),
        now: DateTime<Utc>,
    ) -> Result<ComparisonResult, AnalyticsError> {
        let leaderboard = self.leaderboard(api_id)?;

        let mut players = Vec::with_capacity(2);
        for tag in [tag_1, tag_2] {
            match self.player(tag, region)? {
                Some(player) => players.push(player),
                None => {
                    return Ok(ComparisonResult::PlayerNotFound {
                        battle_tag: tag.to_string(),
                    })
                }
            }
        }

        let history_1 = self.store.player_history(players[0].id, leaderboard.id)?;
        let history_2 = self.store.player_history(players[1].id, leaderboard.id)?;
        Ok(calculate_comparison(
            (players[0].battle_tag.as_str(), history_1.as_slice()),
            (players[1].battle_tag.as_str(), history_2.as_slice()),
            now,
        ))
    }

    pub fn available_leaderboards(&self) -> Result<Vec<LeaderboardChoice>, AnalyticsError> {
        Ok(self.store.available_leaderboards()?)
    }

    pub fn db_stats(&self) -> Result<DbStats, AnalyticsError> {
        Ok(self.store.db_stats()?)
    }
}
