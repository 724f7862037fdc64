// src/pipeline/sync.rs

//! Background leaderboard synchronization.
//!
//! Seeds the snapshot once at startup when the store is empty, then loops
//! forever: fetch, replace the snapshot when the fetch returned teams, sleep
//! for the fixed interval. Nothing that happens inside a cycle stops the loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::models::TeamRecord;
use crate::services::LeaderboardSource;
use crate::storage::{ReplaceSummary, SnapshotStore};

/// What one sync cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The snapshot was replaced
    Replaced { teams: usize, rows: usize },
    /// The fetch came back empty; the previous snapshot was kept
    SkippedEmpty,
    /// Writing failed and was rolled back; the previous snapshot was kept
    StoreFailed(String),
}

/// Result of the startup seeding step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The store already held rows
    AlreadySeeded { rows: usize },
    /// The store was empty and a cycle ran
    Seeded(CycleOutcome),
}

/// Drives the fetch → replace cycle.
pub struct SyncScheduler {
    source: Arc<dyn LeaderboardSource>,
    store: Arc<SnapshotStore>,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(
        source: Arc<dyn LeaderboardSource>,
        store: Arc<SnapshotStore>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            store,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Populate an empty store once; leave a non-empty one alone.
    pub async fn seed(&self) -> Result<SeedOutcome> {
        let rows = self.store.run_blocking(|store| store.row_count()).await?;
        if rows > 0 {
            log::info!("Database already has {} records, skipping initial seed", rows);
            return Ok(SeedOutcome::AlreadySeeded { rows });
        }

        log::info!("Database is empty, seeding initial data...");
        let outcome = self.run_cycle().await;
        match &outcome {
            CycleOutcome::Replaced { .. } => log::info!("Initial data seeded successfully"),
            _ => log::warn!("Failed to fetch initial data"),
        }
        Ok(SeedOutcome::Seeded(outcome))
    }

    /// Run one fetch → replace cycle. Never fails; the outcome says what happened.
    pub async fn run_cycle(&self) -> CycleOutcome {
        log::info!("Syncing leaderboard...");
        let teams = self.source.fetch().await;
        if teams.is_empty() {
            log::warn!("No leaderboard data received, keeping previous snapshot");
            return CycleOutcome::SkippedEmpty;
        }

        match replace_in_background(Arc::clone(&self.store), teams).await {
            Ok(summary) => CycleOutcome::Replaced {
                teams: summary.teams,
                rows: summary.rows,
            },
            Err(error) => {
                log::error!("Error storing leaderboard data: {}", error);
                CycleOutcome::StoreFailed(error.to_string())
            }
        }
    }

    /// Seed, then cycle until `shutdown` resolves.
    ///
    /// The delay runs from the end of one cycle to the start of the next.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tokio::select! {
            seeded = self.seed() => {
                if let Err(error) = seeded {
                    log::error!("Error seeding initial data: {}", error);
                }
            }
            _ = &mut shutdown => {
                log::info!("Sync stopped during seeding");
                return;
            }
        }

        loop {
            tokio::select! {
                _ = self.run_cycle() => {}
                _ = &mut shutdown => break,
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => break,
            }
        }

        log::info!("Leaderboard sync stopped");
    }

    /// Seed, then cycle for the lifetime of the process.
    pub async fn run(&self) {
        self.run_until(futures::future::pending::<()>()).await;
    }
}

/// Replace the snapshot on the blocking pool. A panic inside the write is
/// reported as a store error.
pub async fn replace_in_background(
    store: Arc<SnapshotStore>,
    teams: Vec<TeamRecord>,
) -> Result<ReplaceSummary> {
    store
        .run_blocking(move |store| store.replace_all(&teams))
        .await
}
