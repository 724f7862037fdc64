// src/services/leaderboard.rs

//! Query operations over the cached leaderboard.
//!
//! [`LeaderboardService`] is the single long-lived object behind every tool
//! call. It owns the store handle, the rank tracker and the subscription
//! table; nothing here is a process global. Store access runs on the blocking
//! pool.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::{Result, ToolError, ToolResult};
use crate::models::{QueryConfig, ServerDetails, SnapshotRow, TeamStanding};
use crate::pipeline::replace_in_background;
use crate::services::movers::{MoversReport, RankTracker};
use crate::services::resolver::{FuzzyResolver, Resolution};
use crate::services::source::LeaderboardSource;
use crate::storage::SnapshotStore;

/// One submission of a team, as cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionStats {
    pub server_id: Option<String>,
    pub submitted_at: Option<String>,
    pub visitors: u64,
    pub invocations: u64,
}

impl From<&SnapshotRow> for SubmissionStats {
    fn from(row: &SnapshotRow) -> Self {
        Self {
            server_id: row.server_id.clone(),
            submitted_at: row.submitted_at.clone(),
            visitors: row.visitors,
            invocations: row.invocations,
        }
    }
}

/// Full statistics for one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamStats {
    pub team_name: String,
    pub rank: Option<usize>,
    pub unique_visitors: u64,
    pub team_size: u64,
    pub invocations: u64,
    pub last_updated: String,
    pub submissions: Vec<SubmissionStats>,
    /// Set when the requested name was corrected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuzzy_note: Option<String>,
}

/// Compact per-team entry used by comparison and top lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamSummary {
    pub rank: usize,
    pub name: String,
    pub visitors: u64,
    pub invocations: u64,
    pub team_size: u64,
}

impl From<&TeamStanding> for TeamSummary {
    fn from(standing: &TeamStanding) -> Self {
        Self {
            rank: standing.rank,
            name: standing.team_name.clone(),
            visitors: standing.unique_visitors,
            invocations: standing.invocations,
            team_size: standing.team_size,
        }
    }
}

/// Side-by-side comparison of several teams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comparison {
    pub teams: Vec<TeamSummary>,
    /// `'query'→'match'` for every corrected name
    pub notes: Vec<String>,
}

/// A top-list entry with the team's server and tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopTeam {
    #[serde(flatten)]
    pub summary: TeamSummary,
    #[serde(flatten)]
    pub details: ServerDetails,
}

/// The best `n` teams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopTeams {
    pub total_teams: usize,
    pub teams: Vec<TopTeam>,
}

/// Where a team stands relative to the visitor milestones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MilestoneStatus {
    pub team: TeamSummary,
    /// Highest milestone already reached
    pub reached: Option<u64>,
    /// Next milestone still ahead
    pub next: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuzzy_note: Option<String>,
}

/// Confirmation of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionReceipt {
    pub user_id: String,
    pub team_name: String,
    pub was_fuzzy: bool,
}

/// Result of a manual refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReceipt {
    pub teams_updated: usize,
    pub rows: usize,
}

/// Health and contents of the snapshot cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseStatus {
    pub healthy: bool,
    pub total_records: usize,
    pub unique_teams: usize,
    pub last_updated: Option<String>,
    pub sync_interval_secs: u64,
    pub top_teams: Vec<TeamSummary>,
}

/// Tool operations over the leaderboard cache.
pub struct LeaderboardService {
    store: Arc<SnapshotStore>,
    source: Arc<dyn LeaderboardSource>,
    resolver: FuzzyResolver,
    tracker: Arc<RankTracker>,
    subscriptions: Mutex<HashMap<String, String>>,
    query: QueryConfig,
    sync_interval_secs: u64,
}

impl LeaderboardService {
    pub fn new(
        store: Arc<SnapshotStore>,
        source: Arc<dyn LeaderboardSource>,
        query: QueryConfig,
        sync_interval_secs: u64,
    ) -> Self {
        Self {
            store,
            source,
            resolver: FuzzyResolver::new(query.fuzzy_threshold),
            tracker: Arc::new(RankTracker::new(query.movers_limit)),
            subscriptions: Mutex::new(HashMap::new()),
            query,
            sync_interval_secs,
        }
    }

    /// Resolve a user-supplied team name against the current snapshot.
    pub async fn resolve_team(&self, query: &str) -> ToolResult<Resolution> {
        let resolver = self.resolver;
        let query = query.to_string();
        let resolution = self
            .store
            .run_blocking(move |store| Ok(resolver.resolve(&query, &store.team_names()?)))
            .await?;
        Ok(resolution)
    }

    /// Statistics for one team, with fuzzy name correction.
    pub async fn get_stats(&self, team_name: &str) -> ToolResult<TeamStats> {
        let team_name = required(team_name, "Team name is required")?;
        let resolver = self.resolver;
        let query = team_name.to_string();

        let (resolution, rows, rank) = self
            .store
            .run_blocking(move |store| {
                let resolution = resolver.resolve(&query, &store.team_names()?);
                let rows = store.team_rows(&resolution.name)?;
                let rank = store
                    .grouped_ranking()?
                    .iter()
                    .find(|standing| standing.team_name == resolution.name)
                    .map(|standing| standing.rank);
                Ok((resolution, rows, rank))
            })
            .await?;

        let Some(first) = rows.first() else {
            return Err(ToolError::not_found(format!(
                "Team '{team_name}' not found"
            )));
        };

        Ok(TeamStats {
            team_name: first.team_name.clone(),
            rank,
            unique_visitors: first.unique_visitors,
            team_size: first.team_size,
            invocations: rows.iter().map(|row| row.invocations).sum(),
            last_updated: first.last_updated.clone(),
            submissions: rows.iter().map(SubmissionStats::from).collect(),
            fuzzy_note: fuzzy_note(&resolution),
        })
    }

    /// Compare two or more comma-separated teams.
    pub async fn compare_teams(&self, team_names: &str) -> ToolResult<Comparison> {
        let queries: Vec<String> = team_names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if queries.len() < 2 {
            return Err(ToolError::validation(
                "Please provide at least two team names separated by commas",
            ));
        }

        let resolver = self.resolver;
        let (resolutions, ranking) = self
            .store
            .run_blocking(move |store| {
                let names = store.team_names()?;
                let resolutions: Vec<(String, Resolution)> = queries
                    .into_iter()
                    .map(|query| {
                        let resolution = resolver.resolve(&query, &names);
                        (query, resolution)
                    })
                    .collect();
                Ok((resolutions, store.grouped_ranking()?))
            })
            .await?;

        let mut wanted = BTreeSet::new();
        let mut notes = Vec::new();
        for (query, resolution) in resolutions {
            if resolution.was_fuzzy {
                notes.push(format!("'{}'→'{}'", query, resolution.name));
            }
            wanted.insert(resolution.name);
        }

        let teams: Vec<TeamSummary> = ranking
            .iter()
            .filter(|standing| wanted.contains(&standing.team_name))
            .map(TeamSummary::from)
            .collect();

        if teams.is_empty() {
            return Err(ToolError::not_found("No data found for the given teams"));
        }

        Ok(Comparison { teams, notes })
    }

    /// The best `n` teams by unique visitors, with server and tool details.
    pub async fn top_n(&self, n: usize) -> ToolResult<TopTeams> {
        if n == 0 {
            return Err(ToolError::validation("n must be at least 1"));
        }

        let teams = self
            .store
            .run_blocking(move |store| {
                store
                    .grouped_ranking()?
                    .iter()
                    .take(n)
                    .map(|standing| {
                        Ok(TopTeam {
                            summary: TeamSummary::from(standing),
                            details: store.server_details(&standing.team_name)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .await?;

        if teams.is_empty() {
            return Err(ToolError::not_found("No data available"));
        }

        Ok(TopTeams {
            total_teams: teams.len(),
            teams,
        })
    }

    /// Which visitor milestone a team has reached and which comes next.
    pub async fn milestone_check(&self, team_name: &str) -> ToolResult<MilestoneStatus> {
        let team_name = required(team_name, "Team name is required")?;
        let resolver = self.resolver;
        let query = team_name.to_string();

        let (resolution, standing) = self
            .store
            .run_blocking(move |store| {
                let resolution = resolver.resolve(&query, &store.team_names()?);
                let standing = store
                    .grouped_ranking()?
                    .into_iter()
                    .find(|standing| standing.team_name == resolution.name);
                Ok((resolution, standing))
            })
            .await?;

        let standing = standing
            .ok_or_else(|| ToolError::not_found(format!("No data found for team: {team_name}")))?;
        let (reached, next) = milestones_around(&self.query.milestones, standing.unique_visitors);

        Ok(MilestoneStatus {
            team: TeamSummary::from(&standing),
            reached,
            next,
            fuzzy_note: fuzzy_note(&resolution),
        })
    }

    /// Remember which team `user_id` follows.
    pub async fn subscribe(
        &self,
        user_id: &str,
        team_name: &str,
    ) -> ToolResult<SubscriptionReceipt> {
        let user_id = required(user_id, "User ID and team name required")?;
        let team_name = required(team_name, "User ID and team name required")?;
        let resolution = self.resolve_team(team_name).await?;

        self.subscriptions
            .lock()
            .map_err(|_| ToolError::store_failure("subscription table lock poisoned"))?
            .insert(user_id.to_string(), resolution.name.clone());

        log::info!("User {} subscribed to {}", user_id, resolution.name);
        Ok(SubscriptionReceipt {
            user_id: user_id.to_string(),
            team_name: resolution.name,
            was_fuzzy: resolution.was_fuzzy,
        })
    }

    /// Statistics for the team `user_id` subscribed to.
    pub async fn my_stats(&self, user_id: &str) -> ToolResult<TeamStats> {
        let team_name = self
            .subscriptions
            .lock()
            .map_err(|_| ToolError::store_failure("subscription table lock poisoned"))?
            .get(user_id)
            .cloned()
            .ok_or_else(|| {
                ToolError::not_found("Not subscribed. Use 'subscribe_team' to subscribe.")
            })?;

        self.get_stats(&team_name).await
    }

    /// Biggest rank changes since the previous call.
    ///
    /// The ranking is read under the tracker lock, so overlapping calls
    /// advance the baseline in order.
    pub async fn top_movers(&self) -> ToolResult<MoversReport> {
        let tracker = Arc::clone(&self.tracker);
        let report = self
            .store
            .run_blocking(move |store| tracker.observe_with(|| store.grouped_ranking()))
            .await?;
        Ok(report)
    }

    /// Fetch and replace the snapshot right now.
    pub async fn refresh(&self) -> ToolResult<RefreshReceipt> {
        log::info!("Manual leaderboard refresh requested...");
        let teams = self.source.try_fetch().await?;
        if teams.is_empty() {
            return Err(ToolError::transient_fetch("No data received from API"));
        }

        let summary = replace_in_background(Arc::clone(&self.store), teams)
            .await
            .map_err(|e| ToolError::store_failure(e.to_string()))?;

        Ok(RefreshReceipt {
            teams_updated: summary.teams,
            rows: summary.rows,
        })
    }

    /// Totals and top teams of the current snapshot.
    pub async fn database_status(&self) -> ToolResult<DatabaseStatus> {
        let top = self.query.status_top;
        let stats = self
            .store
            .run_blocking(move |store| store.aggregate_stats(top))
            .await?;

        Ok(DatabaseStatus {
            healthy: stats.total_rows > 0,
            total_records: stats.total_rows,
            unique_teams: stats.distinct_teams,
            last_updated: stats.last_updated,
            sync_interval_secs: self.sync_interval_secs,
            top_teams: stats.top.iter().map(TeamSummary::from).collect(),
        })
    }

    /// Configured identity value.
    pub fn identity(&self) -> &str {
        &self.query.identity
    }
}

fn required<'a>(value: &'a str, message: &str) -> ToolResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ToolError::validation(message))
    } else {
        Ok(trimmed)
    }
}

fn fuzzy_note(resolution: &Resolution) -> Option<String> {
    resolution
        .was_fuzzy
        .then(|| format!("Showing results for '{}'", resolution.name))
}

/// Highest milestone `<= visitors` and lowest milestone `> visitors`.
fn milestones_around(milestones: &[u64], visitors: u64) -> (Option<u64>, Option<u64>) {
    let reached = milestones.iter().copied().filter(|&m| m <= visitors).max();
    let next = milestones.iter().copied().filter(|&m| m > visitors).min();
    (reached, next)
}
