//! Scrape target definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Page cap applied when a target does not set one (top 1000 at 25 rows/page).
pub const DEFAULT_MAX_PAGES: u32 = 40;

/// One (region, leaderboard) pair ingested per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeTarget {
    /// Upstream region code, e.g. "EU", "US", "AP"
    pub region: String,

    /// Upstream leaderboard id, e.g. "battlegrounds"
    pub leaderboard_id: String,

    /// Name stored on the leaderboard row when first created
    pub display_name: String,

    /// Maximum number of pages to fetch
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

impl ScrapeTarget {
    pub fn new(
        region: impl Into<String>,
        leaderboard_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            leaderboard_id: leaderboard_id.into(),
            display_name: display_name.into(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Short label used in logs and run reports.
    pub fn label(&self) -> String {
        format!("{}/{}", self.region, self.leaderboard_id)
    }
}

impl fmt::Display for ScrapeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.display_name)
    }
}

/// Which absent players receive a sentinel row in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SentinelPolicy {
    /// Anyone with history for the leaderboard and season, on every run they are absent.
    #[default]
    EveryRun,

    /// Only players whose latest row is live, so absence is recorded once.
    OnTransition,
}
