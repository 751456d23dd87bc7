//! Statistics calculation engine.
//!
//! Pure functions over rank history rows:
//! - Per-player rating statistics and daily swings
//! - 24h movers
//! - Latest ladder snapshot and top-N
//! - Rating series for charts and two-player comparison
//!
//! Sentinel rows (no rank, no rating) only count towards days tracked;
//! every rating-based metric ignores them.

pub mod service;

pub use service::{AnalyticsError, LeaderboardService};

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::models::{
    ComparisonResult, DailyMover, LeaderboardEntry, PlayerComparison, PlayerId, PlayerStats,
    RankHistory, RatingChartResult, RatingPoint,
};

/// Gainers and losers kept on each side of the movers list.
pub const MOVERS_PER_SIDE: usize = 10;

pub const MOVERS_WINDOW_HOURS: i64 = 24;

pub const COMPARISON_WINDOW_DAYS: i64 = 30;

/// Rows returned by a player history lookup.
pub const HISTORY_LIMIT: usize = 20;

/// Points plotted on a rating chart.
pub const CHART_LIMIT: usize = 30;

pub const DEFAULT_TOP_N: usize = 25;

/// A series needs at least this many points to be drawn or compared.
pub const MIN_SERIES_POINTS: usize = 2;

/// Rated rows ordered by scrape time.
fn rated_rows(history: &[RankHistory]) -> Vec<(&RankHistory, i32)> {
    let mut rated: Vec<(&RankHistory, i32)> = history
        .iter()
        .filter_map(|h| h.rating.map(|rating| (h, rating)))
        .collect();
    rated.sort_by_key(|(h, _)| (h.scraped_at, h.id));
    rated
}

/// Change per UTC calendar date: last rating of the day minus the first.
pub fn calculate_daily_changes(history: &[RankHistory]) -> BTreeMap<NaiveDate, i32> {
    let mut days: BTreeMap<NaiveDate, (i32, i32)> = BTreeMap::new();
    for (row, rating) in rated_rows(history) {
        days.entry(row.scrape_date())
            .and_modify(|(_, last)| *last = rating)
            .or_insert((rating, rating));
    }
    days.into_iter()
        .map(|(date, (first, last))| (date, last - first))
        .collect()
}

/// Statistics over a player's history, or `None` without any rated row.
pub fn calculate_player_stats(battle_tag: &str, history: &[RankHistory]) -> Option<PlayerStats> {
    let rated = rated_rows(history);
    let (_, current_rating) = *rated.last()?;

    let ratings: Vec<i32> = rated.iter().map(|(_, r)| *r).collect();
    let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
    let average = sum.div_euclid(ratings.len() as i64) as i32;

    let changes = calculate_daily_changes(history);

    let rated_days: BTreeSet<NaiveDate> = rated.iter().map(|(h, _)| h.scrape_date()).collect();
    let tracked_days: BTreeSet<NaiveDate> = history.iter().map(|h| h.scrape_date()).collect();

    Some(PlayerStats {
        battle_tag: battle_tag.to_string(),
        peak_rating: ratings.iter().copied().max().unwrap_or(current_rating),
        lowest_rating: ratings.iter().copied().min().unwrap_or(current_rating),
        current_rating,
        average_rating: average,
        biggest_daily_gain: changes.values().copied().max().unwrap_or(0),
        biggest_daily_loss: changes.values().copied().min().unwrap_or(0),
        days_in_ranking: rated_days.len() as u32,
        days_outside_ranking: tracked_days.difference(&rated_days).count() as u32,
    })
}

/// Players whose rating moved inside the trailing window ending at `now`.
///
/// Only players with at least two rated rows in the window qualify. The
/// result is the union of the top gainers and top losers, sorted by change
/// descending.
pub fn calculate_daily_movers(
    history: &[RankHistory],
    tags: &HashMap<PlayerId, String>,
    now: DateTime<Utc>,
) -> Vec<DailyMover> {
    let since = now - Duration::hours(MOVERS_WINDOW_HOURS);

    let mut per_player: BTreeMap<PlayerId, Vec<&RankHistory>> = BTreeMap::new();
    for row in history {
        if row.rating.is_some() && row.scraped_at >= since && row.scraped_at <= now {
            per_player.entry(row.player_id).or_default().push(row);
        }
    }

    let mut movers: Vec<DailyMover> = per_player
        .into_iter()
        .filter(|(_, rows)| rows.len() >= MIN_SERIES_POINTS)
        .filter_map(|(player_id, mut rows)| {
            rows.sort_by_key(|h| (h.scraped_at, h.id));
            let oldest = rows.first()?.rating?;
            let newest = rows.last()?.rating?;
            Some(DailyMover {
                player_id,
                battle_tag: tags
                    .get(&player_id)
                    .cloned()
                    .unwrap_or_else(|| player_id.to_string()),
                change: newest - oldest,
                current_rating: newest,
            })
        })
        .collect();

    movers.sort_by(|a, b| b.change.cmp(&a.change).then(a.player_id.cmp(&b.player_id)));

    let keep: HashSet<PlayerId> = movers
        .iter()
        .take(MOVERS_PER_SIDE)
        .chain(movers.iter().rev().take(MOVERS_PER_SIDE))
        .map(|m| m.player_id)
        .collect();
    movers.retain(|m| keep.contains(&m.player_id));
    movers
}

/// Ranked rows at the newest timestamp that has any ranked row, by rank.
pub fn calculate_latest_snapshot(
    history: &[RankHistory],
    tags: &HashMap<PlayerId, String>,
) -> Vec<LeaderboardEntry> {
    let Some(latest) = history
        .iter()
        .filter(|h| h.rank.is_some())
        .map(|h| h.scraped_at)
        .max()
    else {
        return Vec::new();
    };

    let mut rows: Vec<&RankHistory> = history
        .iter()
        .filter(|h| h.rank.is_some() && h.scraped_at == latest)
        .collect();
    rows.sort_by_key(|h| (h.rank, h.id));

    rows.into_iter()
        .map(|h| to_entry(h, tags.get(&h.player_id).map(String::as_str).unwrap_or_default()))
        .collect()
}

/// First `n` entries of a snapshot.
pub fn top_n(mut snapshot: Vec<LeaderboardEntry>, n: usize) -> Vec<LeaderboardEntry> {
    snapshot.truncate(n);
    snapshot
}

/// The most recent rows of one player, newest first, sentinels included.
pub fn recent_entries(battle_tag: &str, history: &[RankHistory], limit: usize) -> Vec<LeaderboardEntry> {
    let mut rows: Vec<&RankHistory> = history.iter().collect();
    rows.sort_by_key(|h| std::cmp::Reverse((h.scraped_at, h.id)));
    rows.into_iter().take(limit).map(|h| to_entry(h, battle_tag)).collect()
}

fn to_entry(row: &RankHistory, battle_tag: &str) -> LeaderboardEntry {
    LeaderboardEntry {
        rank: row.rank,
        battle_tag: battle_tag.to_string(),
        rating: row.rating,
        scraped_at: row.scraped_at,
    }
}

/// Rated points oldest first, optionally restricted to `since` onwards.
pub fn rating_points(history: &[RankHistory], since: Option<DateTime<Utc>>) -> Vec<RatingPoint> {
    rated_rows(history)
        .into_iter()
        .filter(|(h, _)| since.map_or(true, |s| h.scraped_at >= s))
        .map(|(h, rating)| RatingPoint {
            timestamp: h.scraped_at,
            rating,
        })
        .collect()
}

/// The first rated points of a player, for charting.
pub fn calculate_rating_chart(battle_tag: &str, history: &[RankHistory]) -> RatingChartResult {
    let mut points = rating_points(history, None);
    points.truncate(CHART_LIMIT);

    if points.len() < MIN_SERIES_POINTS {
        return RatingChartResult::InsufficientHistory {
            battle_tag: battle_tag.to_string(),
            points: points.len(),
        };
    }

    RatingChartResult::Ready {
        battle_tag: battle_tag.to_string(),
        points,
    }
}

/// Rating series of two players over the trailing comparison window.
pub fn calculate_comparison(
    (battle_tag_1, history_1): (&str, &[RankHistory]),
    (battle_tag_2, history_2): (&str, &[RankHistory]),
    now: DateTime<Utc>,
) -> ComparisonResult {
    let since = Some(now - Duration::days(COMPARISON_WINDOW_DAYS));
    let points_1 = rating_points(history_1, since);
    let points_2 = rating_points(history_2, since);

    if points_1.len() < MIN_SERIES_POINTS || points_2.len() < MIN_SERIES_POINTS {
        return ComparisonResult::InsufficientData {
            battle_tag_1: battle_tag_1.to_string(),
            points_1: points_1.len(),
            battle_tag_2: battle_tag_2.to_string(),
            points_2: points_2.len(),
        };
    }

    ComparisonResult::Ready(PlayerComparison {
        battle_tag_1: battle_tag_1.to_string(),
        history_1: points_1,
        battle_tag_2: battle_tag_2.to_string(),
        history_2: points_2,
    })
}
