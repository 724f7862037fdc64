// src/services/movers.rs

//! Rank movement tracking between queries.
//!
//! The tracker keeps the ranking seen by the previous query and compares the
//! next one against it. Every query consumes the baseline: two queries with no
//! sync in between report no movement.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::TeamStanding;

/// Default number of movements reported.
pub const DEFAULT_LIMIT: usize = 5;

/// Direction of a rank change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// One team's movement between two observed rankings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankMovement {
    pub team: String,
    /// `previous_rank - current_rank`; positive means the team climbed
    pub change: i64,
    pub direction: Direction,
    pub previous_rank: usize,
    pub current_rank: usize,
}

/// Result of one tracker query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoversReport {
    /// No baseline existed; the current ranking became the baseline
    TrackingStarted,
    /// Biggest movers first; empty when nothing moved
    Movements(Vec<RankMovement>),
}

#[derive(Debug, Default)]
enum Baseline {
    #[default]
    Uninitialized,
    Tracking(HashMap<String, usize>),
}

/// Remembers the previous ranking and reports movement against it.
#[derive(Debug)]
pub struct RankTracker {
    baseline: Mutex<Baseline>,
    limit: usize,
}

impl RankTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            baseline: Mutex::new(Baseline::Uninitialized),
            limit,
        }
    }

    /// Whether a baseline is currently held.
    pub fn is_tracking(&self) -> bool {
        self.baseline
            .lock()
            .map(|baseline| matches!(*baseline, Baseline::Tracking(_)))
            .unwrap_or(false)
    }

    /// Compare `current` (ordered, rank 1 first) against the held baseline and
    /// make it the new baseline.
    ///
    /// An empty ranking drops the baseline; the next non-empty one starts
    /// tracking again.
    pub fn observe(&self, current: &[TeamStanding]) -> Result<MoversReport> {
        self.observe_with(|| Ok(current.to_vec()))
    }

    /// Like [`observe`](Self::observe), but `read` runs while the baseline is
    /// locked, so concurrent callers see rankings in the order they swap them in.
    pub fn observe_with<F>(&self, read: F) -> Result<MoversReport>
    where
        F: FnOnce() -> Result<Vec<TeamStanding>>,
    {
        let mut baseline = self
            .baseline
            .lock()
            .map_err(|_| AppError::store("rank tracker lock poisoned"))?;
        let current = read()?;

        let current_ranks: HashMap<String, usize> = current
            .iter()
            .map(|standing| (standing.team_name.clone(), standing.rank))
            .collect();

        let previous = match &*baseline {
            Baseline::Uninitialized => {
                if !current_ranks.is_empty() {
                    *baseline = Baseline::Tracking(current_ranks);
                    log::info!("Rank tracking started with {} teams", current.len());
                }
                return Ok(MoversReport::TrackingStarted);
            }
            Baseline::Tracking(previous) => previous,
        };

        let mut movements: Vec<RankMovement> = current
            .iter()
            .filter_map(|standing| {
                let previous_rank = *previous.get(&standing.team_name)?;
                let change = rank_as_i64(previous_rank) - rank_as_i64(standing.rank);
                (change != 0).then(|| RankMovement {
                    team: standing.team_name.clone(),
                    change,
                    direction: if change > 0 {
                        Direction::Up
                    } else {
                        Direction::Down
                    },
                    previous_rank,
                    current_rank: standing.rank,
                })
            })
            .collect();

        // Stable: equal magnitudes keep current-rank order.
        movements.sort_by_key(|movement| std::cmp::Reverse(movement.change.unsigned_abs()));
        movements.truncate(self.limit);

        *baseline = if current_ranks.is_empty() {
            Baseline::Uninitialized
        } else {
            Baseline::Tracking(current_ranks)
        };

        Ok(MoversReport::Movements(movements))
    }
}

impl Default for RankTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

fn rank_as_i64(rank: usize) -> i64 {
    i64::try_from(rank).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranking(names: &[&str]) -> Vec<TeamStanding> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| TeamStanding {
                rank: index + 1,
                team_name: name.to_string(),
                unique_visitors: 1000 - index as u64,
                team_size: 1,
                invocations: 0,
            })
            .collect()
    }

    fn changes(report: &MoversReport) -> Vec<(String, i64)> {
        match report {
            MoversReport::Movements(movements) => movements
                .iter()
                .map(|m| (m.team.clone(), m.change))
                .collect(),
            MoversReport::TrackingStarted => panic!("expected movements"),
        }
    }

    #[test]
    fn test_first_call_starts_tracking() {
        let tracker = RankTracker::default();
        assert!(!tracker.is_tracking());

        let report = tracker.observe(&ranking(&["A", "B", "C"])).unwrap();
        assert_eq!(report, MoversReport::TrackingStarted);
        assert!(tracker.is_tracking());

        // Baseline equals the ranking just observed.
        let report = tracker.observe(&ranking(&["A", "B", "C"])).unwrap();
        assert_eq!(report, MoversReport::Movements(Vec::new()));
    }

    #[test]
    fn test_second_call_reports_swaps() {
        let tracker = RankTracker::default();
        tracker.observe(&ranking(&["A", "B", "C"])).unwrap();

        let report = tracker.observe(&ranking(&["B", "A", "C"])).unwrap();
        assert_eq!(
            changes(&report),
            vec![("B".to_string(), 1), ("A".to_string(), -1)]
        );

        if let MoversReport::Movements(movements) = &report {
            assert_eq!(movements[0].direction, Direction::Up);
            assert_eq!(movements[1].direction, Direction::Down);
            assert_eq!(movements[1].previous_rank, 1);
            assert_eq!(movements[1].current_rank, 2);
        }

        // New baseline is {A:2, B:1, C:3}.
        let report = tracker.observe(&ranking(&["B", "A", "C"])).unwrap();
        assert_eq!(report, MoversReport::Movements(Vec::new()));
    }

    #[test]
    fn test_sorted_by_magnitude_and_limited() {
        let tracker = RankTracker::new(2);
        tracker
            .observe(&ranking(&["A", "B", "C", "D", "E"]))
            .unwrap();

        // E: 5 -> 1 (+4), A: 1 -> 2 (-1), B: 2 -> 3 (-1), C: 3 -> 4 (-1), D: 4 -> 5 (-1)
        let report = tracker
            .observe(&ranking(&["E", "A", "B", "C", "D"]))
            .unwrap();
        assert_eq!(
            changes(&report),
            vec![("E".to_string(), 4), ("A".to_string(), -1)]
        );
    }

    #[test]
    fn test_new_teams_are_ignored() {
        let tracker = RankTracker::default();
        tracker.observe(&ranking(&["A", "B"])).unwrap();

        // N enters at the top and pushes A and B down.
        let report = tracker.observe(&ranking(&["N", "A", "B"])).unwrap();
        assert_eq!(
            changes(&report),
            vec![("A".to_string(), -1), ("B".to_string(), -1)]
        );
    }

    #[test]
    fn test_empty_ranking_resets_tracking() {
        let tracker = RankTracker::default();
        tracker.observe(&ranking(&["A", "B"])).unwrap();

        let report = tracker.observe(&[]).unwrap();
        assert_eq!(report, MoversReport::Movements(Vec::new()));
        assert!(!tracker.is_tracking());

        let report = tracker.observe(&ranking(&["B", "A"])).unwrap();
        assert_eq!(report, MoversReport::TrackingStarted);
    }

    #[test]
    fn test_observe_with_reads_under_lock() {
        let tracker = RankTracker::default();
        tracker.observe(&ranking(&["A", "B"])).unwrap();

        let report = tracker
            .observe_with(|| {
                assert!(tracker.baseline.try_lock().is_err());
                Ok(ranking(&["B", "A"]))
            })
            .unwrap();
        assert_eq!(
            changes(&report),
            vec![("B".to_string(), 1), ("A".to_string(), -1)]
        );
    }

    #[test]
    fn test_observe_with_read_error_keeps_baseline() {
        let tracker = RankTracker::default();
        tracker.observe(&ranking(&["A", "B"])).unwrap();

        let result = tracker.observe_with(|| Err(AppError::store("disk gone")));
        assert!(result.is_err());
        assert!(tracker.is_tracking());

        let report = tracker.observe(&ranking(&["B", "A"])).unwrap();
        assert_eq!(changes(&report).len(), 2);
    }

    #[test]
    fn test_empty_ranking_does_not_start_tracking() {
        let tracker = RankTracker::default();
        let report = tracker.observe(&[]).unwrap();

        assert_eq!(report, MoversReport::TrackingStarted);
        assert!(!tracker.is_tracking());

        let report = tracker.observe(&ranking(&["A"])).unwrap();
        assert_eq!(report, MoversReport::TrackingStarted);
        assert!(tracker.is_tracking());
    }
}
