//! SQLite store: schema, prior-state loading and atomic batch commits.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{format_timestamp, StorageError};
use crate::models::{
    CommitSummary, HistoryBatch, Leaderboard, LeaderboardId, LeaderboardRef, PlayerId, PlayerRef,
    ScrapeTarget, Season, SeasonId, SeasonRef, SentinelPolicy,
};
use crate::sync::PriorState;

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS players (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        battle_tag TEXT NOT NULL,
        region TEXT NOT NULL,
        UNIQUE (battle_tag, region)
    );

    CREATE TABLE IF NOT EXISTS seasons (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        blizzard_id INTEGER NOT NULL UNIQUE,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS leaderboards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        api_id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS rank_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scrape_timestamp TEXT NOT NULL,
        rank INTEGER NULL,
        rating INTEGER NULL,
        player_id INTEGER NOT NULL REFERENCES players(id) ON DELETE CASCADE,
        season_id INTEGER NOT NULL REFERENCES seasons(id) ON DELETE CASCADE,
        leaderboard_id INTEGER NOT NULL REFERENCES leaderboards(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_rank_history_player
        ON rank_history(player_id, leaderboard_id, scrape_timestamp);
    CREATE INDEX IF NOT EXISTS idx_rank_history_board
        ON rank_history(leaderboard_id, season_id, scrape_timestamp);
    CREATE INDEX IF NOT EXISTS idx_rank_history_timestamp
        ON rank_history(scrape_timestamp);
"#;

/// Handle to the ladder database.
pub struct Store {
    pub(super) conn: Connection,
}

impl Store {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Opened {:?} (journal_mode={})", path, mode);

        Self::with_connection(conn)
    }

    /// In-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Load what the store knows about a target for the given season.
    pub fn load_prior_state(
        &self,
        target: &ScrapeTarget,
        season_blizzard_id: i64,
        policy: SentinelPolicy,
    ) -> Result<PriorState, StorageError> {
        let season = self
            .conn
            .query_row(
                "SELECT id, blizzard_id, name FROM seasons WHERE blizzard_id = ?1",
                params![season_blizzard_id],
                |row| {
                    Ok(Season {
                        id: SeasonId(row.get(0)?),
                        blizzard_id: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?;

        let leaderboard = self.find_leaderboard(&target.leaderboard_id)?;

        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, battle_tag FROM players WHERE region = ?1")?;
        let players = stmt
            .query_map(params![target.region], |row| {
                Ok((row.get::<_, String>(1)?, PlayerId(row.get(0)?)))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;

        let tracked = match (&season, &leaderboard) {
            (Some(season), Some(leaderboard)) => {
                self.tracked_players(&target.region, season.id, leaderboard.id, policy)?
            }
            _ => BTreeMap::new(),
        };

        debug!(
            target = %target.label(),
            known_players = players.len(),
            tracked = tracked.len(),
            "Loaded prior state"
        );

        Ok(PriorState {
            season,
            leaderboard,
            players,
            tracked,
        })
    }

    fn tracked_players(
        &self,
        region: &str,
        season_id: SeasonId,
        leaderboard_id: LeaderboardId,
        policy: SentinelPolicy,
    ) -> Result<BTreeMap<PlayerId, String>, StorageError> {
        let sql = match policy {
            SentinelPolicy::EveryRun => {
                r#"
                SELECT DISTINCT p.id, p.battle_tag
                FROM players p
                JOIN rank_history h ON h.player_id = p.id
                WHERE p.region = ?1 AND h.season_id = ?2 AND h.leaderboard_id = ?3
                "#
            }
            SentinelPolicy::OnTransition => {
                r#"
                SELECT DISTINCT p.id, p.battle_tag
                FROM players p
                JOIN rank_history h ON h.player_id = p.id
                WHERE p.region = ?1 AND h.season_id = ?2 AND h.leaderboard_id = ?3
                  AND NOT (h.rank IS NULL AND h.rating IS NULL)
                  AND h.scrape_timestamp = (
                      SELECT MAX(h2.scrape_timestamp)
                      FROM rank_history h2
                      WHERE h2.player_id = p.id AND h2.season_id = ?2 AND h2.leaderboard_id = ?3
                  )
                "#
            }
        };

        let mut stmt = self.conn.prepare_cached(sql)?;
        let tracked = stmt
            .query_map(params![region, season_id.get(), leaderboard_id.get()], |row| {
                Ok((PlayerId(row.get(0)?), row.get::<_, String>(1)?))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(tracked)
    }

    /// Write a batch in one transaction: references, players, then history.
    pub fn commit(&mut self, batch: &HistoryBatch) -> Result<CommitSummary, StorageError> {
        let tx = self.conn.transaction()?;

        let season_id = match &batch.season {
            SeasonRef::Existing(id) => *id,
            SeasonRef::New { blizzard_id, name } => {
                tx.execute(
                    "INSERT INTO seasons (blizzard_id, name) VALUES (?1, ?2)
                     ON CONFLICT(blizzard_id) DO NOTHING",
                    params![blizzard_id, name],
                )?;
                SeasonId(tx.query_row(
                    "SELECT id FROM seasons WHERE blizzard_id = ?1",
                    params![blizzard_id],
                    |row| row.get(0),
                )?)
            }
        };

        let leaderboard_id = match &batch.leaderboard {
            LeaderboardRef::Existing(id) => *id,
            LeaderboardRef::New { api_id, name } => {
                tx.execute(
                    "INSERT INTO leaderboards (api_id, name) VALUES (?1, ?2)
                     ON CONFLICT(api_id) DO NOTHING",
                    params![api_id, name],
                )?;
                LeaderboardId(tx.query_row(
                    "SELECT id FROM leaderboards WHERE api_id = ?1",
                    params![api_id],
                    |row| row.get(0),
                )?)
            }
        };

        let mut players_created = 0;
        let mut new_ids = Vec::with_capacity(batch.new_players.len());
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO players (battle_tag, region) VALUES (?1, ?2)
                 ON CONFLICT(battle_tag, region) DO NOTHING",
            )?;
            let mut select =
                tx.prepare_cached("SELECT id FROM players WHERE battle_tag = ?1 AND region = ?2")?;

            for player in &batch.new_players {
                players_created += insert.execute(params![player.battle_tag, player.region])?;
                let id: i64 =
                    select.query_row(params![player.battle_tag, player.region], |row| row.get(0))?;
                new_ids.push(PlayerId(id));
            }
        }

        let timestamp = format_timestamp(&batch.scraped_at);
        let mut rows_inserted = 0;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO rank_history
                    (scrape_timestamp, rank, rating, player_id, season_id, leaderboard_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for row in &batch.rows {
                let player_id = match row.player {
                    PlayerRef::Existing(id) => id,
                    PlayerRef::New(index) => *new_ids
                        .get(index)
                        .ok_or(StorageError::DanglingPlayer(index))?,
                };
                rows_inserted += insert.execute(params![
                    timestamp,
                    row.rank,
                    row.rating,
                    player_id.get(),
                    season_id.get(),
                    leaderboard_id.get()
                ])?;
            }
        }

        tx.commit()?;

        let summary = CommitSummary {
            season_id,
            leaderboard_id,
            players_created,
            rows_inserted,
            sentinel_rows: batch.sentinel_count(),
        };
        info!(
            players_created = summary.players_created,
            rows = summary.rows_inserted,
            sentinels = summary.sentinel_rows,
            "Committed history batch"
        );
        Ok(summary)
    }

    /// Leaderboard by its upstream id.
    pub fn find_leaderboard(&self, api_id: &str) -> Result<Option<Leaderboard>, StorageError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, api_id, name FROM leaderboards WHERE api_id = ?1",
                params![api_id],
                |row| {
                    Ok(Leaderboard {
                        id: LeaderboardId(row.get(0)?),
                        api_id: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::row;
    use crate::models::{LeaderboardRow, NewHistoryRow, NewPlayer};
    use crate::sync::{reconcile, Snapshot};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn target() -> ScrapeTarget {
        ScrapeTarget::new("EU", "battlegrounds", "Battlegrounds Solo")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
    }

    fn run(
        store: &mut Store,
        target: &ScrapeTarget,
        season: i64,
        rows: Vec<LeaderboardRow>,
        at: DateTime<Utc>,
        policy: SentinelPolicy,
    ) -> CommitSummary {
        let snapshot = Snapshot {
            season_id: season,
            rows,
            pages_fetched: 1,
            duplicates_removed: 0,
        };
        let prior = store.load_prior_state(target, season, policy).unwrap();
        let batch = reconcile(&snapshot, target, &prior, at);
        store.commit(&batch).unwrap()
    }

    fn sentinel_count(store: &Store, battle_tag: &str) -> i64 {
        store
            .conn
            .query_row(
                "SELECT COUNT(*) FROM rank_history h JOIN players p ON p.id = h.player_id
                 WHERE p.battle_tag = ?1 AND h.rank IS NULL AND h.rating IS NULL",
                params![battle_tag],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn test_open_file_twice_keeps_schema() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("ladder.db");

        {
            let mut store = Store::open(&path).unwrap();
            run(&mut store, &target(), 14, vec![row(1, "A", 9000)], t0(), SentinelPolicy::EveryRun);
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.db_stats().unwrap().history_count, 1);
    }

    #[test]
    fn test_first_commit_creates_everything() {
        let mut store = Store::open_in_memory().unwrap();
        let summary = run(
            &mut store,
            &target(),
            14,
            vec![row(1, "A", 9000), row(2, "B", 8900)],
            t0(),
            SentinelPolicy::EveryRun,
        );

        assert_eq!(summary.players_created, 2);
        assert_eq!(summary.rows_inserted, 2);
        assert_eq!(summary.sentinel_rows, 0);

        let stats = store.db_stats().unwrap();
        assert_eq!(stats.season_count, 1);
        assert_eq!(stats.leaderboard_count, 1);
        assert_eq!(stats.player_count, 2);
    }

    #[test]
    fn test_reference_creation_is_idempotent() {
        let mut store = Store::open_in_memory().unwrap();
        let first = run(&mut store, &target(), 14, vec![row(1, "A", 9000)], t0(), SentinelPolicy::EveryRun);
        let second = run(
            &mut store,
            &target(),
            14,
            vec![row(1, "A", 9050)],
            t0() + Duration::hours(1),
            SentinelPolicy::EveryRun,
        );

        assert_eq!(first.season_id, second.season_id);
        assert_eq!(first.leaderboard_id, second.leaderboard_id);
        assert_eq!(second.players_created, 0);

        let stats = store.db_stats().unwrap();
        assert_eq!(stats.season_count, 1);
        assert_eq!(stats.leaderboard_count, 1);
        assert_eq!(stats.player_count, 1);
        assert_eq!(stats.history_count, 2);
    }

    #[test]
    fn test_stale_new_references_do_not_duplicate() {
        // Two batches reconciled against the same empty prior state
        let mut store = Store::open_in_memory().unwrap();
        let snapshot = Snapshot {
            season_id: 14,
            rows: vec![row(1, "A", 9000)],
            pages_fetched: 1,
            duplicates_removed: 0,
        };
        let prior = store.load_prior_state(&target(), 14, SentinelPolicy::EveryRun).unwrap();
        let first = reconcile(&snapshot, &target(), &prior, t0());
        let second = reconcile(&snapshot, &target(), &prior, t0() + Duration::minutes(5));

        store.commit(&first).unwrap();
        let summary = store.commit(&second).unwrap();

        assert_eq!(summary.players_created, 0);
        let stats = store.db_stats().unwrap();
        assert_eq!(stats.season_count, 1);
        assert_eq!(stats.leaderboard_count, 1);
        assert_eq!(stats.player_count, 1);
    }

    #[test]
    fn test_rows_equal_live_plus_missing() {
        let mut store = Store::open_in_memory().unwrap();
        run(
            &mut store,
            &target(),
            14,
            vec![row(1, "A", 9000), row(2, "B", 8900), row(3, "C", 8800)],
            t0(),
            SentinelPolicy::EveryRun,
        );

        let summary = run(
            &mut store,
            &target(),
            14,
            vec![row(1, "A", 9100), row(2, "D", 8950)],
            t0() + Duration::hours(1),
            SentinelPolicy::EveryRun,
        );

        assert_eq!(summary.rows_inserted, 2 + 2);
        assert_eq!(summary.sentinel_rows, 2);
        assert_eq!(sentinel_count(&store, "A"), 0);
        assert_eq!(sentinel_count(&store, "B"), 1);
    }

    #[test]
    fn test_every_run_policy_repeats_sentinels() {
        let mut store = Store::open_in_memory().unwrap();
        let policy = SentinelPolicy::EveryRun;
        run(&mut store, &target(), 14, vec![row(1, "A", 9000), row(2, "B", 8900)], t0(), policy);
        for hour in 1..=3 {
            run(&mut store, &target(), 14, vec![row(1, "A", 9000)], t0() + Duration::hours(hour), policy);
        }

        assert_eq!(sentinel_count(&store, "B"), 3);
    }

    #[test]
    fn test_on_transition_policy_records_absence_once() {
        let mut store = Store::open_in_memory().unwrap();
        let policy = SentinelPolicy::OnTransition;
        run(&mut store, &target(), 14, vec![row(1, "A", 9000), row(2, "B", 8900)], t0(), policy);
        for hour in 1..=3 {
            run(&mut store, &target(), 14, vec![row(1, "A", 9000)], t0() + Duration::hours(hour), policy);
        }
        assert_eq!(sentinel_count(&store, "B"), 1);

        // Reappearing re-arms the transition
        run(&mut store, &target(), 14, vec![row(1, "B", 9000)], t0() + Duration::hours(4), policy);
        run(&mut store, &target(), 14, vec![row(1, "A", 9000)], t0() + Duration::hours(5), policy);
        assert_eq!(sentinel_count(&store, "B"), 2);
    }

    #[test]
    fn test_new_season_does_not_inherit_tracking() {
        let mut store = Store::open_in_memory().unwrap();
        run(&mut store, &target(), 14, vec![row(1, "A", 9000)], t0(), SentinelPolicy::EveryRun);
        let summary = run(
            &mut store,
            &target(),
            15,
            vec![row(1, "B", 5000)],
            t0() + Duration::hours(1),
            SentinelPolicy::EveryRun,
        );

        assert_eq!(summary.sentinel_rows, 0);
        assert_eq!(store.db_stats().unwrap().season_count, 2);
    }

    #[test]
    fn test_same_tag_in_two_regions() {
        let mut store = Store::open_in_memory().unwrap();
        let us = ScrapeTarget::new("US", "battlegrounds", "Battlegrounds Solo");
        run(&mut store, &target(), 14, vec![row(1, "A", 9000)], t0(), SentinelPolicy::EveryRun);
        let summary = run(&mut store, &us, 14, vec![row(1, "A", 7000)], t0(), SentinelPolicy::EveryRun);

        assert_eq!(summary.players_created, 1);
        assert_eq!(summary.sentinel_rows, 0);
        assert_eq!(store.db_stats().unwrap().player_count, 2);
    }

    #[test]
    fn test_failed_commit_writes_nothing() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = HistoryBatch {
            region: "EU".to_string(),
            scraped_at: t0(),
            season: SeasonRef::New {
                blizzard_id: 14,
                name: Season::display_name(14),
            },
            leaderboard: LeaderboardRef::New {
                api_id: "battlegrounds".to_string(),
                name: "Battlegrounds Solo".to_string(),
            },
            new_players: vec![NewPlayer {
                battle_tag: "A".to_string(),
                region: "EU".to_string(),
            }],
            rows: vec![
                NewHistoryRow::live(PlayerRef::New(0), 1, 9000),
                NewHistoryRow::live(PlayerRef::New(3), 2, 8900),
            ],
        };

        let err = store.commit(&batch).unwrap_err();
        assert!(matches!(err, StorageError::DanglingPlayer(3)));

        let stats = store.db_stats().unwrap();
        assert_eq!(stats, crate::models::DbStats::default());
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let mut store = Store::open_in_memory().unwrap();
        let batch = HistoryBatch {
            region: "EU".to_string(),
            scraped_at: t0(),
            season: SeasonRef::New {
                blizzard_id: 14,
                name: Season::display_name(14),
            },
            leaderboard: LeaderboardRef::New {
                api_id: "battlegrounds".to_string(),
                name: "Battlegrounds Solo".to_string(),
            },
            new_players: vec![],
            rows: vec![NewHistoryRow::sentinel(PlayerRef::Existing(PlayerId(999)))],
        };

        assert!(matches!(store.commit(&batch), Err(StorageError::Sqlite(_))));
        assert_eq!(store.db_stats().unwrap().season_count, 0);
    }
}
