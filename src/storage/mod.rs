//! Relational storage for ladder history.
//!
//! A single SQLite database holds four tables:
//! - `players` (unique on battle tag + region)
//! - `seasons` (unique on upstream season id)
//! - `leaderboards` (unique on upstream leaderboard id)
//! - `rank_history` (append-only observations)

mod queries;
mod sqlite;

pub use queries::TaggedHistory;
pub use sqlite::Store;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Batch references unknown new player #{0}")]
    DanglingPlayer(usize),
}

/// Fixed-width UTC text so SQL equality and ordering match instant order.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}
