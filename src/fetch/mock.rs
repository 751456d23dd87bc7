//! Scripted page source for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use super::{FetchError, PageSource};
use crate::models::{LeaderboardData, LeaderboardPage, LeaderboardRow, PageInfo};

/// One scripted response for a page.
#[derive(Debug, Clone)]
pub enum MockReply {
    Page(LeaderboardPage),
    Status(u16),
    RateLimited,
    MalformedJson,
}

/// Serves fixed pages keyed by the `page` query parameter.
///
/// Scripted replies for a page are consumed first; once exhausted the
/// page's fixed content is served.
#[derive(Default)]
pub struct MockPageSource {
    pages: Mutex<HashMap<u32, LeaderboardPage>>,
    scripts: Mutex<HashMap<u32, VecDeque<MockReply>>>,
    calls: Mutex<HashMap<u32, usize>>,
}

pub fn build_page(season_id: i64, total_pages: u32, rows: Vec<LeaderboardRow>) -> LeaderboardPage {
    LeaderboardPage {
        season_id,
        leaderboard: LeaderboardData {
            rows,
            pagination: PageInfo { total_pages },
        },
    }
}

pub fn row(rank: i32, account_id: &str, rating: i32) -> LeaderboardRow {
    LeaderboardRow {
        rank,
        account_id: account_id.to_string(),
        rating,
    }
}

impl MockPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ladder of `total_pages` full pages with accounts `player{rank}`.
    pub fn with_pages(season_id: i64, total_pages: u32, rows_per_page: u32) -> Self {
        let source = Self::new();
        for page in 1..=total_pages {
            let rows = (0..rows_per_page)
                .map(|i| {
                    let rank = ((page - 1) * rows_per_page + i + 1) as i32;
                    row(rank, &format!("player{}", rank), 10_000 - rank)
                })
                .collect();
            source.set_page(page, build_page(season_id, total_pages, rows));
        }
        source
    }

    pub fn set_page(&self, page: u32, content: LeaderboardPage) {
        self.pages.lock().unwrap().insert(page, content);
    }

    pub fn script(&self, page: u32, replies: Vec<MockReply>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(page, replies.into_iter().collect());
    }

    pub fn calls_for(&self, page: u32) -> usize {
        self.calls.lock().unwrap().get(&page).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn page_of(url: &Url) -> u32 {
        url.query_pairs()
            .find(|(k, _)| k == "page")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(1)
    }
}

#[async_trait]
impl PageSource for MockPageSource {
    async fn fetch_page(&self, url: &Url) -> Result<LeaderboardPage, FetchError> {
        let page = Self::page_of(url);
        *self.calls.lock().unwrap().entry(page).or_default() += 1;

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&page)
            .and_then(|queue| queue.pop_front());

        match scripted {
            Some(MockReply::Page(content)) => Ok(content),
            Some(MockReply::Status(status)) => Err(FetchError::HttpStatus {
                status,
                message: "scripted".to_string(),
            }),
            Some(MockReply::RateLimited) => Err(FetchError::RateLimited {
                host: "mock".to_string(),
                retry_after_secs: 0,
            }),
            Some(MockReply::MalformedJson) => {
                Err(serde_json::from_str::<LeaderboardPage>("{").unwrap_err().into())
            }
            None => self
                .pages
                .lock()
                .unwrap()
                .get(&page)
                .cloned()
                .ok_or(FetchError::HttpStatus {
                    status: 404,
                    message: format!("no page {}", page),
                }),
        }
    }
}
