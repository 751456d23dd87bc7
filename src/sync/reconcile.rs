//! Reconciliation: diff a snapshot against previously tracked players and
//! build the history batch for one run.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::models::{
    HistoryBatch, Leaderboard, LeaderboardRef, NewHistoryRow, NewPlayer, PlayerId, PlayerRef,
    ScrapeTarget, Season, SeasonRef,
};

use super::assemble::Snapshot;

/// What the store already knows about a target before this run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorState {
    pub season: Option<Season>,
    pub leaderboard: Option<Leaderboard>,

    /// Every player of the target's region, by battle tag
    pub players: HashMap<String, PlayerId>,

    /// Players tracked for this (season, leaderboard) under the sentinel policy
    pub tracked: BTreeMap<PlayerId, String>,
}

/// Build the batch of new rows for one run of one target.
///
/// Live rows come first in snapshot (rank) order, followed by one sentinel
/// per tracked player absent from the snapshot, ordered by player id.
pub fn reconcile(
    snapshot: &Snapshot,
    target: &ScrapeTarget,
    prior: &PriorState,
    scraped_at: DateTime<Utc>,
) -> HistoryBatch {
    let season = match &prior.season {
        Some(s) if s.blizzard_id == snapshot.season_id => SeasonRef::Existing(s.id),
        _ => SeasonRef::New {
            blizzard_id: snapshot.season_id,
            name: Season::display_name(snapshot.season_id),
        },
    };

    let leaderboard = match &prior.leaderboard {
        Some(lb) if lb.api_id == target.leaderboard_id => LeaderboardRef::Existing(lb.id),
        _ => LeaderboardRef::New {
            api_id: target.leaderboard_id.clone(),
            name: target.display_name.clone(),
        },
    };

    let mut new_players: Vec<NewPlayer> = Vec::new();
    let mut pending: HashMap<&str, usize> = HashMap::new();
    let mut rows = Vec::with_capacity(snapshot.rows.len() + prior.tracked.len());

    for live in &snapshot.rows {
        let player = match prior.players.get(&live.account_id) {
            Some(id) => PlayerRef::Existing(*id),
            None => {
                let index = *pending.entry(live.account_id.as_str()).or_insert_with(|| {
                    new_players.push(NewPlayer {
                        battle_tag: live.account_id.clone(),
                        region: target.region.clone(),
                    });
                    new_players.len() - 1
                });
                PlayerRef::New(index)
            }
        };
        rows.push(NewHistoryRow::live(player, live.rank, live.rating));
    }

    let live_tags: HashSet<&str> = snapshot.rows.iter().map(|r| r.account_id.as_str()).collect();
    for (player_id, battle_tag) in &prior.tracked {
        if !live_tags.contains(battle_tag.as_str()) {
            rows.push(NewHistoryRow::sentinel(PlayerRef::Existing(*player_id)));
        }
    }

    HistoryBatch {
        region: target.region.clone(),
        scraped_at,
        season,
        leaderboard,
        new_players,
        rows,
    }
}
