//! # Ladder Tracker
//!
//! Periodically snapshots a public ranked-ladder API and keeps an
//! append-only history of player standings, with derived statistics on top.
//!
//! ## Architecture
//!
//! - **fetch**: Retrying HTTP page source for the leaderboard API
//! - **sync**: Snapshot assembly, reconciliation and the run orchestrator
//! - **storage**: SQLite persistence (players, seasons, leaderboards, history)
//! - **calculate**: Player statistics, movers, ladder views and comparisons
//! - **api**: Read-only REST API
//! - **config**: Configuration loading and validation
//! - **models**: Core data structures

pub mod api;
pub mod calculate;
pub mod config;
pub mod fetch;
pub mod models;
pub mod storage;
pub mod sync;

pub use models::*;

use std::time::Duration;

/// Parse a scrape interval such as `"1d"`, `"6h"`, `"30m"` or `"90s"`.
///
/// A bare number is taken as seconds. Values too large for a `Duration`
/// in seconds are rejected rather than wrapped.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let unit = s.chars().last()?;
    let (digits, secs_per_unit) = match unit {
        'd' => (&s[..s.len() - 1], 86_400),
        'h' => (&s[..s.len() - 1], 3_600),
        'm' => (&s[..s.len() - 1], 60),
        's' => (&s[..s.len() - 1], 1),
        _ => (s, 1),
    };

    let count: u64 = digits.trim().parse().ok()?;
    count.checked_mul(secs_per_unit).map(Duration::from_secs)
}
