//! Sync orchestrator.
//!
//! Coordinates one scrape run over every configured target:
//! 1. Assemble a deduplicated snapshot from the paginated API
//! 2. Load what the store already knows about the target
//! 3. Reconcile into live rows plus sentinel rows for dropped players
//! 4. Commit the batch in a single transaction
//!
//! A failing target is logged and recorded; the remaining targets still run.

pub mod assemble;
pub mod reconcile;

pub use assemble::{merge_rows, AssembleError, PageFailure, Snapshot, SnapshotAssembler};
pub use reconcile::{reconcile, PriorState};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::models::{CommitSummary, ScrapeTarget, SentinelPolicy};
use crate::storage::{Store, StorageError};

/// Errors that can occur during sync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Snapshot error: {0}")]
    Assemble(#[from] AssembleError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("No scrape targets configured")]
    NoTargets,

    #[error("Commit task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Targets scraped in order on every run
    pub targets: Vec<ScrapeTarget>,

    /// Interval between runs in watch mode
    pub interval: Duration,

    pub sentinel_policy: SentinelPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            targets: crate::config::default_targets(),
            interval: Duration::from_secs(3600),
            sentinel_policy: SentinelPolicy::default(),
        }
    }
}

/// State of the most recent sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncState {
    /// When the last sync started
    pub last_sync_started: Option<DateTime<Utc>>,

    /// When the last sync completed
    pub last_sync_completed: Option<DateTime<Utc>>,

    pub last_sync_status: SyncStatus,

    pub targets_succeeded: u32,
    pub targets_failed: u32,

    /// History rows written in the last run, sentinels included
    pub rows_written: usize,

    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// What happened to one target in a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TargetOutcome {
    Committed {
        target: String,
        season_id: i64,
        pages_fetched: u32,
        duplicates_removed: usize,
        summary: CommitSummary,
    },
    Failed {
        target: String,
        error: String,
    },
}

impl TargetOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TargetOutcome::Committed { .. })
    }
}

/// Result of a sync run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<TargetOutcome>,
    /// Stopped before every target ran; `outcomes` holds the ones that did
    pub cancelled: bool,
    #[serde(skip)]
    pub duration: Duration,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_committed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn rows_written(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                TargetOutcome::Committed { summary, .. } => summary.rows_inserted,
                TargetOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

/// Sync orchestrator.
pub struct SyncOrchestrator {
    config: SyncConfig,
    assembler: SnapshotAssembler,
    store: Arc<Mutex<Store>>,
    state: Arc<RwLock<SyncState>>,
    cancel_token: Arc<RwLock<bool>>,
}

impl SyncOrchestrator {
    pub fn new(config: SyncConfig, assembler: SnapshotAssembler, store: Arc<Mutex<Store>>) -> Self {
        Self {
            config,
            assembler,
            store,
            state: Arc::new(RwLock::new(SyncState::default())),
            cancel_token: Arc::new(RwLock::new(false)),
        }
    }

    /// Get current sync state.
    pub async fn state(&self) -> SyncState {
        self.state.read().await.clone()
    }

    /// Check if sync is currently running.
    pub async fn is_running(&self) -> bool {
        self.state.read().await.last_sync_status == SyncStatus::Running
    }

    /// Request cancellation; takes effect between targets.
    pub async fn cancel(&self) {
        *self.cancel_token.write().await = true;
    }

    async fn is_cancelled(&self) -> bool {
        *self.cancel_token.read().await
    }

    /// Run every target once, in configured order.
    pub async fn sync_once(&self) -> Result<RunReport, SyncError> {
        if self.config.targets.is_empty() {
            return Err(SyncError::NoTargets);
        }

        let started_at = Utc::now();
        {
            let mut state = self.state.write().await;
            state.last_sync_started = Some(started_at);
            state.last_sync_status = SyncStatus::Running;
            state.errors.clear();
        }

        let start = std::time::Instant::now();
        info!(targets = self.config.targets.len(), "Starting sync run");

        let mut outcomes = Vec::with_capacity(self.config.targets.len());
        let mut cancelled = false;
        for target in &self.config.targets {
            if self.is_cancelled().await {
                warn!(
                    completed = outcomes.len(),
                    remaining = self.config.targets.len() - outcomes.len(),
                    "Sync cancelled"
                );
                cancelled = true;
                break;
            }

            let outcome = match self.sync_target(target).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(target = %target.label(), error = %e, "Target failed");
                    TargetOutcome::Failed {
                        target: target.label(),
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let report = RunReport {
            started_at,
            outcomes,
            cancelled,
            duration: start.elapsed(),
        };

        {
            let mut state = self.state.write().await;
            state.last_sync_completed = Some(Utc::now());
            state.last_sync_status = if report.cancelled {
                SyncStatus::Cancelled
            } else if report.failed() == 0 {
                SyncStatus::Completed
            } else {
                SyncStatus::Failed
            };
            state.targets_succeeded = report.succeeded() as u32;
            state.targets_failed = report.failed() as u32;
            state.rows_written = report.rows_written();
            state.errors = report
                .outcomes
                .iter()
                .filter_map(|o| match o {
                    TargetOutcome::Failed { target, error } => Some(format!("{}: {}", target, error)),
                    TargetOutcome::Committed { .. } => None,
                })
                .collect();
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            rows = report.rows_written(),
            "Sync run completed in {:?}",
            report.duration
        );

        Ok(report)
    }

    async fn sync_target(&self, target: &ScrapeTarget) -> Result<TargetOutcome, SyncError> {
        let snapshot = self.assembler.assemble(target).await?;
        let scraped_at = Utc::now();

        if snapshot.rows.is_empty() {
            warn!(
                target = %target.label(),
                "Snapshot has no rows; every tracked player will be marked missing"
            );
        }

        let (season_id, pages_fetched, duplicates_removed) =
            (snapshot.season_id, snapshot.pages_fetched, snapshot.duplicates_removed);

        // SQLite work runs off the async workers
        let store = Arc::clone(&self.store);
        let policy = self.config.sentinel_policy;
        let job_target = target.clone();
        let (live, summary) = tokio::task::spawn_blocking(move || {
            let mut store = store.blocking_lock();
            let prior = store.load_prior_state(&job_target, snapshot.season_id, policy)?;
            let batch = reconcile(&snapshot, &job_target, &prior, scraped_at);
            let summary = store.commit(&batch)?;
            Ok::<_, StorageError>((batch.live_count(), summary))
        })
        .await??;

        info!(
            target = %target.label(),
            season_id,
            live,
            sentinels = summary.sentinel_rows,
            new_players = summary.players_created,
            "Target synced"
        );

        Ok(TargetOutcome::Committed {
            target: target.label(),
            season_id,
            pages_fetched,
            duplicates_removed,
            summary,
        })
    }

    /// Run periodic sync in the background until cancelled.
    pub async fn run_periodic(self: Arc<Self>) {
        let mut ticker = interval(self.config.interval);

        info!("Starting periodic sync every {:?}", self.config.interval);

        loop {
            ticker.tick().await;

            if self.is_cancelled().await {
                info!("Periodic sync stopped");
                break;
            }

            match self.sync_once().await {
                Ok(report) if report.cancelled => {
                    info!("Periodic sync cancelled");
                    break;
                }
                Ok(report) => {
                    info!(
                        "Periodic sync completed: {} targets ok, {} failed",
                        report.succeeded(),
                        report.failed()
                    );
                }
                Err(e) => {
                    error!("Periodic sync failed: {}", e);
                }
            }
        }
    }
}
