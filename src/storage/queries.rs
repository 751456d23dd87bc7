//! Read queries backing the analytics layer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, parse_timestamp, Store, StorageError};
use crate::models::{
    DbStats, LeaderboardChoice, LeaderboardId, Player, PlayerId, RankHistory,
    SeasonId,
};

const HISTORY_COLUMNS: &str =
    "h.id, h.scrape_timestamp, h.rank, h.rating, h.player_id, h.season_id, h.leaderboard_id";

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<RankHistory> {
    let timestamp: String = row.get(1)?;
    Ok(RankHistory {
        id: row.get(0)?,
        scraped_at: parse_timestamp(1, &timestamp)?,
        rank: row.get(2)?,
        rating: row.get(3)?,
        player_id: PlayerId(row.get(4)?),
        season_id: SeasonId(row.get(5)?),
        leaderboard_id: LeaderboardId(row.get(6)?),
    })
}

/// History rows together with the battle tag of each player they mention.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaggedHistory {
    pub rows: Vec<RankHistory>,
    pub tags: HashMap<PlayerId, String>,
}

impl TaggedHistory {
    fn collect(
        rows: impl Iterator<Item = rusqlite::Result<(RankHistory, String)>>,
    ) -> Result<Self, StorageError> {
        let mut out = Self::default();
        for item in rows {
            let (history, tag) = item?;
            out.tags.entry(history.player_id).or_insert(tag);
            out.rows.push(history);
        }
        Ok(out)
    }
}

impl Store {
    /// Look up a player by battle tag within a region, ignoring case.
    ///
    /// An exact-case match wins when several tags differ only by case.
    pub fn find_player(&self, battle_tag: &str, region: &str) -> Result<Option<Player>, StorageError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, battle_tag, region FROM players
                 WHERE battle_tag = ?1 COLLATE NOCASE AND region = ?2
                 ORDER BY battle_tag = ?1 DESC, id
                 LIMIT 1",
                params![battle_tag, region],
                |row| {
                    Ok(Player {
                        id: PlayerId(row.get(0)?),
                        battle_tag: row.get(1)?,
                        region: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Every row of a player on a leaderboard, oldest first.
    pub fn player_history(
        &self,
        player_id: PlayerId,
        leaderboard_id: LeaderboardId,
    ) -> Result<Vec<RankHistory>, StorageError> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM rank_history h
             WHERE h.player_id = ?1 AND h.leaderboard_id = ?2
             ORDER BY h.scrape_timestamp, h.id"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params![player_id.get(), leaderboard_id.get()], history_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Rated rows of a (leaderboard, region) scraped at or after `since`.
    pub fn rated_history_since(
        &self,
        leaderboard_id: LeaderboardId,
        region: &str,
        since: DateTime<Utc>,
    ) -> Result<TaggedHistory, StorageError> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS}, p.battle_tag
             FROM rank_history h JOIN players p ON p.id = h.player_id
             WHERE h.leaderboard_id = ?1 AND p.region = ?2
               AND h.rating IS NOT NULL AND h.scrape_timestamp >= ?3
             ORDER BY h.scrape_timestamp, h.id"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(
            params![leaderboard_id.get(), region, format_timestamp(&since)],
            |row| Ok((history_from_row(row)?, row.get::<_, String>(7)?)),
        )?;
        TaggedHistory::collect(rows)
    }

    /// Ranked rows at the newest timestamp that has any ranked row.
    pub fn latest_ranked_rows(
        &self,
        leaderboard_id: LeaderboardId,
        region: &str,
    ) -> Result<TaggedHistory, StorageError> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS}, p.battle_tag
             FROM rank_history h JOIN players p ON p.id = h.player_id
             WHERE h.leaderboard_id = ?1 AND p.region = ?2 AND h.rank IS NOT NULL
               AND h.scrape_timestamp = (
                   SELECT MAX(h2.scrape_timestamp)
                   FROM rank_history h2 JOIN players p2 ON p2.id = h2.player_id
                   WHERE h2.leaderboard_id = ?1 AND p2.region = ?2 AND h2.rank IS NOT NULL
               )
             ORDER BY h.rank, h.id"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![leaderboard_id.get(), region], |row| {
            Ok((history_from_row(row)?, row.get::<_, String>(7)?))
        })?;
        TaggedHistory::collect(rows)
    }

    /// Distinct (leaderboard, region) pairs that have at least one row.
    pub fn available_leaderboards(&self) -> Result<Vec<LeaderboardChoice>, StorageError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT l.id, l.api_id, l.name, p.region
             FROM rank_history h
             JOIN leaderboards l ON l.id = h.leaderboard_id
             JOIN players p ON p.id = h.player_id
             ORDER BY p.region, l.api_id",
        )?;
        let choices = stmt
            .query_map([], |row| {
                Ok(LeaderboardChoice {
                    leaderboard_id: LeaderboardId(row.get(0)?),
                    api_id: row.get(1)?,
                    name: row.get(2)?,
                    region: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(choices)
    }

    pub fn db_stats(&self) -> Result<DbStats, StorageError> {
        Ok(self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM players),
                (SELECT COUNT(*) FROM seasons),
                (SELECT COUNT(*) FROM leaderboards),
                (SELECT COUNT(*) FROM rank_history)",
            [],
            |row| {
                Ok(DbStats {
                    player_count: row.get::<_, i64>(0)? as u64,
                    season_count: row.get::<_, i64>(1)? as u64,
                    leaderboard_count: row.get::<_, i64>(2)? as u64,
                    history_count: row.get::<_, i64>(3)? as u64,
                })
            },
        )?)
    }
}
