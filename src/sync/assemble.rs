//! Snapshot assembly: paginated fetch, merge and dedup for one target.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::fetch::{page_url, FetchError, Fetcher};
use crate::models::{LeaderboardRow, ScrapeTarget};

/// A page that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    /// Page number, or 0 when the page task itself died
    pub page: u32,
    pub reason: String,
}

/// Errors that abandon a target's snapshot.
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("First page failed: {0}")]
    FirstPage(#[source] FetchError),

    #[error("{} of {requested} pages failed", .failed.len())]
    PagesFailed {
        failed: Vec<PageFailure>,
        requested: u32,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// All rows of one target, merged, sorted by rank and deduplicated.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub season_id: i64,
    pub rows: Vec<LeaderboardRow>,
    pub pages_fetched: u32,
    pub duplicates_removed: usize,
}

/// Drives a [`Fetcher`] across every page of a target.
#[derive(Clone)]
pub struct SnapshotAssembler {
    fetcher: Fetcher,
    base_url: String,
    page_concurrency: usize,
}

impl SnapshotAssembler {
    pub fn new(fetcher: Fetcher, base_url: impl Into<String>, page_concurrency: usize) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            page_concurrency: page_concurrency.max(1),
        }
    }

    /// Fetch page 1, then the remaining pages concurrently.
    ///
    /// Any page that fails after retries fails the whole target; a partial
    /// snapshot would mark every player on the missing pages as dropped.
    pub async fn assemble(&self, target: &ScrapeTarget) -> Result<Snapshot, AssembleError> {
        let first_url = page_url(&self.base_url, target, 1)?;
        let first = self
            .fetcher
            .fetch(&first_url)
            .await
            .map_err(AssembleError::FirstPage)?;

        let season_id = first.season_id;
        let declared = first.total_pages();
        let budget = declared.max(1).min(target.max_pages.max(1));

        info!(
            target = %target.label(),
            season_id,
            declared_pages = declared,
            page_budget = budget,
            "Fetched first page"
        );

        let mut pages: Vec<(u32, Vec<LeaderboardRow>)> = vec![(1, first.leaderboard.rows)];
        let mut failed = Vec::new();

        if budget > 1 {
            let semaphore = Arc::new(Semaphore::new(self.page_concurrency));
            let mut tasks = JoinSet::new();

            for page in 2..=budget {
                let url = page_url(&self.base_url, target, page)?;
                let fetcher = self.fetcher.clone();
                let semaphore = semaphore.clone();
                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    (page, fetcher.fetch(&url).await)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((page, Ok(content))) => pages.push((page, content.leaderboard.rows)),
                    Ok((page, Err(e))) => {
                        warn!(target = %target.label(), page, error = %e, "Page fetch failed");
                        failed.push(PageFailure {
                            page,
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => {
                        warn!(target = %target.label(), error = %e, "Page task aborted");
                        failed.push(PageFailure {
                            page: 0,
                            reason: format!("page task aborted: {}", e),
                        });
                    }
                }
            }
        }

        if !failed.is_empty() {
            failed.sort_by_key(|f| f.page);
            return Err(AssembleError::PagesFailed {
                failed,
                requested: budget,
            });
        }

        pages.sort_by_key(|(page, _)| *page);
        let pages_fetched = pages.len() as u32;
        let (rows, duplicates_removed) =
            merge_rows(pages.into_iter().flat_map(|(_, rows)| rows).collect());

        if duplicates_removed > 0 {
            warn!(
                target = %target.label(),
                duplicates = duplicates_removed,
                "Dropped duplicate account ids from snapshot"
            );
        }

        info!(
            target = %target.label(),
            rows = rows.len(),
            pages = pages_fetched,
            "Snapshot assembled"
        );

        Ok(Snapshot {
            season_id,
            rows,
            pages_fetched,
            duplicates_removed,
        })
    }
}

/// Sort rows by rank and keep the first occurrence of each account.
///
/// Returns the surviving rows and how many duplicates were dropped.
pub fn merge_rows(mut rows: Vec<LeaderboardRow>) -> (Vec<LeaderboardRow>, usize) {
    rows.sort_by_key(|r| r.rank);

    let before = rows.len();
    let mut seen = HashSet::new();
    rows.retain(|r| seen.insert(r.account_id.clone()));

    let removed = before - rows.len();
    (rows, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::{build_page, row, MockPageSource, MockReply};
    use crate::fetch::RetryPolicy;
    use pretty_assertions::assert_eq;

    fn assembler(source: Arc<MockPageSource>) -> SnapshotAssembler {
        let fetcher = Fetcher::new(
            source,
            RetryPolicy {
                max_retries: 2,
                initial_delay_ms: 1,
                backoff_multiplier: 2.0,
            },
        );
        SnapshotAssembler::new(fetcher, "https://example.com/lb", 4)
    }

    fn target() -> ScrapeTarget {
        ScrapeTarget::new("EU", "battlegrounds", "Battlegrounds Solo")
    }

    #[test]
    fn test_merge_rows_dedups_by_lowest_rank() {
        let (rows, removed) = merge_rows(vec![row(1, "A", 9000), row(5, "A", 8000), row(2, "B", 8500)]);

        assert_eq!(rows, vec![row(1, "A", 9000), row(2, "B", 8500)]);
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_merge_rows_order_independent() {
        let (rows, removed) = merge_rows(vec![row(3, "C", 1), row(1, "A", 3), row(2, "B", 2)]);

        assert_eq!(removed, 0);
        assert_eq!(
            rows.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn test_assemble_all_pages() {
        let source = Arc::new(MockPageSource::with_pages(14, 3, 25));
        let snapshot = assembler(source.clone()).assemble(&target()).await.unwrap();

        assert_eq!(snapshot.season_id, 14);
        assert_eq!(snapshot.pages_fetched, 3);
        assert_eq!(snapshot.rows.len(), 75);
        assert_eq!(snapshot.rows.first().unwrap().rank, 1);
        assert_eq!(snapshot.rows.last().unwrap().rank, 75);
        assert_eq!(source.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_assemble_respects_page_cap() {
        let source = Arc::new(MockPageSource::with_pages(14, 10, 25));
        let snapshot = assembler(source.clone())
            .assemble(&target().with_max_pages(4))
            .await
            .unwrap();

        assert_eq!(snapshot.pages_fetched, 4);
        assert_eq!(snapshot.rows.len(), 100);
        assert_eq!(source.calls_for(5), 0);
    }

    #[tokio::test]
    async fn test_assemble_dedups_across_pages() {
        let source = Arc::new(MockPageSource::new());
        source.set_page(1, build_page(9, 2, vec![row(1, "A", 9000), row(2, "B", 8900)]));
        source.set_page(2, build_page(9, 2, vec![row(3, "A", 8800), row(4, "C", 8700)]));

        let snapshot = assembler(source).assemble(&target()).await.unwrap();

        assert_eq!(snapshot.duplicates_removed, 1);
        assert_eq!(
            snapshot.rows.iter().map(|r| r.account_id.as_str()).collect::<Vec<_>>(),
            vec!["A", "B", "C"]
        );
    }

    #[tokio::test]
    async fn test_assemble_zero_total_pages_uses_first_page() {
        let source = Arc::new(MockPageSource::new());
        source.set_page(1, build_page(9, 0, vec![row(1, "A", 9000)]));

        let snapshot = assembler(source.clone()).assemble(&target()).await.unwrap();

        assert_eq!(snapshot.rows.len(), 1);
        assert_eq!(source.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_assemble_first_page_failure_abandons_target() {
        let source = Arc::new(MockPageSource::with_pages(14, 3, 25));
        source.script(1, vec![MockReply::Status(403)]);

        let err = assembler(source.clone()).assemble(&target()).await.unwrap_err();

        assert!(matches!(err, AssembleError::FirstPage(_)));
        assert_eq!(source.calls_for(2), 0);
    }

    #[tokio::test]
    async fn test_assemble_later_page_failure_fails_target() {
        let source = Arc::new(MockPageSource::with_pages(14, 4, 25));
        source.script(3, vec![MockReply::Status(500); 5]);
        source.script(4, vec![MockReply::MalformedJson]);

        let err = assembler(source).assemble(&target()).await.unwrap_err();

        match err {
            AssembleError::PagesFailed { failed, requested } => {
                assert_eq!(requested, 4);
                assert_eq!(
                    failed.iter().map(|f| f.page).collect::<Vec<_>>(),
                    vec![3, 4]
                );
            }
            other => panic!("Expected PagesFailed, got {:?}", other),
        }
    }
}
