//! SQLite snapshot cache.
//!
//! Holds exactly one leaderboard snapshot, flattened to one row per
//! (team, submission). Every sync replaces the whole table inside a single
//! transaction.
//!
//! ## Table Layout
//!
//! ```text
//! leaderboard
//! ├── id               INTEGER PK AUTOINCREMENT
//! ├── team_name        TEXT NOT NULL       (idx_team_name)
//! ├── server_id        TEXT
//! ├── submitted_at     TEXT
//! ├── visitors         INTEGER
//! ├── unique_visitors  INTEGER             (same for all rows of a team)
//! ├── team_size        INTEGER             (same for all rows of a team)
//! ├── invocations      INTEGER
//! ├── server_name      TEXT
//! ├── server_description TEXT
//! ├── tool_names       TEXT                (JSON array, sorted)
//! └── last_updated     TEXT                (RFC 3339, one value per replace)
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::{AppError, Result};
use crate::models::{
    LISTED_TOOLS, ServerDetails, ServerInfo, SnapshotRow, StoreStats, TeamRecord, TeamStanding,
    description_preview,
};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS leaderboard (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  team_name TEXT NOT NULL,
  server_id TEXT,
  submitted_at TEXT,
  visitors INTEGER NOT NULL DEFAULT 0 CHECK (visitors >= 0),
  unique_visitors INTEGER NOT NULL DEFAULT 0 CHECK (unique_visitors >= 0),
  team_size INTEGER NOT NULL DEFAULT 0 CHECK (team_size >= 0),
  invocations INTEGER NOT NULL DEFAULT 0 CHECK (invocations >= 0),
  server_name TEXT,
  server_description TEXT,
  tool_names TEXT NOT NULL DEFAULT '[]',
  last_updated TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_team_name ON leaderboard(team_name);
";

// Tie-break on team name keeps the ranking independent of row order.
const GROUPED_RANKING_SQL: &str = r"
SELECT team_name, MAX(unique_visitors), MAX(team_size), SUM(invocations)
FROM leaderboard
GROUP BY team_name
ORDER BY MAX(unique_visitors) DESC, team_name ASC
LIMIT ?1
";

/// Summary of a completed `replace_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub teams: usize,
    pub rows: usize,
}

/// Single-table SQLite cache of the current leaderboard snapshot.
///
/// The connection sits behind a mutex. Reads and the replace transaction both
/// hold it for their whole duration, so a reader observes either the previous
/// snapshot or the new one, never a mix.
pub struct SnapshotStore {
    conn: Mutex<Connection>,
}

impl SnapshotStore {
    /// Open (or create) a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("Opened snapshot store at {} ({})", path.display(), mode);
        Self::from_connection(conn)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::store("snapshot store lock poisoned"))
    }

    /// Replace the whole snapshot with `records`.
    ///
    /// Rolls back and keeps the previous snapshot if any statement fails.
    pub fn replace_all(&self, records: &[TeamRecord]) -> Result<ReplaceSummary> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let written_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        tx.execute("DELETE FROM leaderboard", [])?;

        let mut rows = 0;
        {
            let mut insert = tx.prepare(
                "INSERT INTO leaderboard
                   (team_name, server_id, submitted_at, visitors, unique_visitors,
                    team_size, invocations, server_name, server_description,
                    tool_names, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;

            for team in records {
                for submission in &team.submissions {
                    insert.execute(params![
                        team.team_name,
                        submission.server_id,
                        submission.submitted_at,
                        to_sql_int(submission.visitors)?,
                        to_sql_int(team.unique_visitors)?,
                        to_sql_int(team.team_size)?,
                        to_sql_int(submission.invocations())?,
                        submission.server_name,
                        submission.server_description,
                        serde_json::to_string(&submission.tool_names())?,
                        written_at,
                    ])?;
                    rows += 1;
                }
            }
        }

        tx.commit()?;
        log::info!("Stored {} teams ({} rows) in snapshot", records.len(), rows);

        Ok(ReplaceSummary {
            teams: records.len(),
            rows,
        })
    }

    /// Run `work` on the blocking pool so SQLite never stalls the async runtime.
    pub async fn run_blocking<T, F>(self: &Arc<Self>, work: F) -> Result<T>
    where
        F: FnOnce(&SnapshotStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || work(&store))
            .await
            .map_err(|e| AppError::store(format!("snapshot task aborted: {e}")))?
    }

    /// Total number of cached rows.
    pub fn row_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM leaderboard", [], |row| row.get(0))?;
        Ok(to_count(count))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.row_count()? == 0)
    }

    /// Distinct team names in the current snapshot.
    pub fn team_names(&self) -> Result<BTreeSet<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT team_name FROM leaderboard")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()?;
        Ok(names)
    }

    /// All rows of one team, most visited submission first.
    pub fn team_rows(&self, team_name: &str) -> Result<Vec<SnapshotRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, team_name, server_id, submitted_at, visitors, unique_visitors,
                    team_size, invocations, last_updated
             FROM leaderboard
             WHERE team_name = ?1
             ORDER BY visitors DESC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![team_name], read_snapshot_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// One standing per team, ordered by unique visitors (ties by name).
    pub fn grouped_ranking(&self) -> Result<Vec<TeamStanding>> {
        let conn = self.lock()?;
        query_ranking(&conn, None)
    }

    /// Server of the team's first listed submission plus its tool names.
    pub fn server_details(&self, team_name: &str) -> Result<ServerDetails> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT server_name, server_description, tool_names
             FROM leaderboard
             WHERE team_name = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![team_name], |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut tools = BTreeSet::new();
        for (_, _, names) in &rows {
            tools.extend(serde_json::from_str::<Vec<String>>(names)?);
        }

        let server = rows
            .first()
            .map(|(name, description, _)| ServerInfo {
                name: name.clone().unwrap_or_default(),
                description: description
                    .as_deref()
                    .map(description_preview)
                    .unwrap_or_default(),
            })
            .unwrap_or_default();

        Ok(ServerDetails {
            server,
            tools: tools.into_iter().take(LISTED_TOOLS).collect(),
        })
    }

    /// Row/team totals plus the `top` best teams.
    pub fn aggregate_stats(&self, top: usize) -> Result<StoreStats> {
        let conn = self.lock()?;

        let (total_rows, distinct_teams): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT team_name) FROM leaderboard",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let last_updated: Option<String> = conn
            .query_row("SELECT MAX(last_updated) FROM leaderboard", [], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()?
            .flatten();

        Ok(StoreStats {
            total_rows: to_count(total_rows),
            distinct_teams: to_count(distinct_teams),
            top: query_ranking(&conn, Some(top))?,
            last_updated,
        })
    }
}

fn query_ranking(conn: &Connection, limit: Option<usize>) -> Result<Vec<TeamStanding>> {
    // A negative LIMIT means no limit in SQLite.
    let limit = limit.map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
    let mut stmt = conn.prepare(GROUPED_RANKING_SQL)?;
    let rows = stmt
        .query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(
            |(index, (team_name, unique_visitors, team_size, invocations))| TeamStanding {
                rank: index + 1,
                team_name,
                unique_visitors: to_u64(unique_visitors),
                team_size: to_u64(team_size),
                invocations: to_u64(invocations),
            },
        )
        .collect())
}

fn read_snapshot_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRow> {
    Ok(SnapshotRow {
        id: row.get(0)?,
        team_name: row.get(1)?,
        server_id: row.get(2)?,
        submitted_at: row.get(3)?,
        visitors: to_u64(row.get(4)?),
        unique_visitors: to_u64(row.get(5)?),
        team_size: to_u64(row.get(6)?),
        invocations: to_u64(row.get(7)?),
        last_updated: row.get(8)?,
    })
}

fn to_sql_int(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| AppError::validation(format!("count {value} does not fit in SQLite INTEGER")))
}

// Columns carry CHECK (>= 0), so negatives never come back.
fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn to_count(value: i64) -> usize {
    usize::try_from(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use tempfile::TempDir;

    use super::*;
    use crate::models::{Submission, SubmissionMetrics};

    fn submission(server_id: &str, visitors: u64, invocations: u64) -> Submission {
        Submission {
            server_id: Some(server_id.to_string()),
            submitted_at: Some("2025-08-02T10:00:00Z".to_string()),
            visitors,
            mcp_metrics: Some(SubmissionMetrics {
                invocations_total: invocations,
                ..SubmissionMetrics::default()
            }),
            ..Submission::default()
        }
    }

    fn team(name: &str, unique_visitors: u64, submissions: Vec<Submission>) -> TeamRecord {
        TeamRecord {
            team_name: name.to_string(),
            unique_visitors,
            team_size: 3,
            submissions,
        }
    }

    fn sample() -> Vec<TeamRecord> {
        vec![
            team(
                "X",
                100,
                vec![submission("x-1", 40, 1), submission("x-2", 60, 2)],
            ),
            team("Y", 250, vec![submission("y-1", 250, 10)]),
            team("Z", 250, vec![submission("z-1", 250, 20)]),
        ]
    }

    #[test]
    fn test_replace_flattens_rows() {
        let store = SnapshotStore::open_in_memory().unwrap();
        let summary = store.replace_all(&sample()).unwrap();

        assert_eq!(summary, ReplaceSummary { teams: 3, rows: 4 });
        assert_eq!(store.row_count().unwrap(), 4);
        assert_eq!(
            store.team_names().unwrap().into_iter().collect::<Vec<_>>(),
            vec!["X", "Y", "Z"]
        );
    }

    #[test]
    fn test_team_rows_ordered_by_visitors() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.replace_all(&sample()).unwrap();

        let rows = store.team_rows("X").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].server_id.as_deref(), Some("x-2"));
        assert_eq!(rows[0].visitors, 60);
        assert_eq!(rows[1].visitors, 40);
        assert!(rows.iter().all(|r| r.unique_visitors == 100 && r.team_size == 3));
        assert_eq!(rows[0].last_updated, rows[1].last_updated);

        assert!(store.team_rows("Nobody").unwrap().is_empty());
    }

    #[test]
    fn test_grouped_ranking_tie_break_by_name() {
        let store = SnapshotStore::open_in_memory().unwrap();
        // Insert Z before Y to show row order does not matter.
        let mut records = sample();
        records.swap(1, 2);
        store.replace_all(&records).unwrap();

        let ranking = store.grouped_ranking().unwrap();
        let names: Vec<_> = ranking.iter().map(|s| s.team_name.as_str()).collect();
        assert_eq!(names, vec!["Y", "Z", "X"]);
        assert_eq!(ranking[0].rank, 1);
        assert_eq!(ranking[2].rank, 3);
        assert_eq!(ranking[2].invocations, 3);
    }

    #[test]
    fn test_replace_is_idempotent() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.replace_all(&sample()).unwrap();
        let first_ranking = store.grouped_ranking().unwrap();
        let first_rows = store.team_rows("X").unwrap();

        store.replace_all(&sample()).unwrap();
        let second_rows = store.team_rows("X").unwrap();

        assert_eq!(store.row_count().unwrap(), 4);
        assert_eq!(store.grouped_ranking().unwrap(), first_ranking);
        let strip = |rows: &[SnapshotRow]| {
            rows.iter()
                .map(|r| (r.server_id.clone(), r.visitors, r.unique_visitors))
                .collect::<Vec<_>>()
        };
        assert_eq!(strip(&first_rows), strip(&second_rows));
    }

    #[test]
    fn test_replace_drops_previous_snapshot() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.replace_all(&sample()).unwrap();
        store
            .replace_all(&[team("Solo", 5, vec![submission("s-1", 5, 0)])])
            .unwrap();

        assert_eq!(store.row_count().unwrap(), 1);
        assert!(store.team_rows("X").unwrap().is_empty());
    }

    #[test]
    fn test_failed_replace_keeps_previous_snapshot() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.replace_all(&sample()).unwrap();

        let oversized = vec![
            team("Fine", 1, vec![submission("f-1", 1, 0)]),
            team("Broken", 1, vec![submission("b-1", u64::MAX, 0)]),
        ];
        assert!(store.replace_all(&oversized).is_err());

        assert_eq!(store.row_count().unwrap(), 4);
        assert!(store.team_rows("Fine").unwrap().is_empty());
    }

    #[test]
    fn test_teams_without_submissions_are_not_stored() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store
            .replace_all(&[team("Ghost", 10, Vec::new())])
            .unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_aggregate_stats() {
        let store = SnapshotStore::open_in_memory().unwrap();
        let empty = store.aggregate_stats(5).unwrap();
        assert_eq!(empty.total_rows, 0);
        assert!(empty.top.is_empty());
        assert!(empty.last_updated.is_none());

        store.replace_all(&sample()).unwrap();
        let stats = store.aggregate_stats(2).unwrap();
        assert_eq!(stats.total_rows, 4);
        assert_eq!(stats.distinct_teams, 3);
        assert_eq!(stats.top.len(), 2);
        assert_eq!(stats.top[0].team_name, "Y");
        assert!(stats.last_updated.is_some());
    }

    #[test]
    fn test_aggregate_stats_with_huge_top() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.replace_all(&sample()).unwrap();

        let stats = store.aggregate_stats(usize::MAX).unwrap();
        assert_eq!(stats.top.len(), 3);
        assert_eq!(store.aggregate_stats(0).unwrap().top.len(), 0);
    }

    #[test]
    fn test_server_details() {
        let mut first = submission("a-1", 10, 5);
        first.server_name = Some("VibeServer".to_string());
        first.server_description = Some(format!("{}\nsecond line", "d".repeat(70)));
        if let Some(metrics) = first.mcp_metrics.as_mut() {
            for tool in ["search", "plan"] {
                metrics.tool_invocations.insert(tool.to_string(), 1.into());
            }
        }
        let mut second = submission("a-2", 90, 1);
        second.server_name = Some("OlderServer".to_string());
        if let Some(metrics) = second.mcp_metrics.as_mut() {
            for tool in ["zoom", "alarm", "book"] {
                metrics.tool_invocations.insert(tool.to_string(), 1.into());
            }
        }

        let store = SnapshotStore::open_in_memory().unwrap();
        store
            .replace_all(&[team("A", 100, vec![first, second])])
            .unwrap();

        let details = store.server_details("A").unwrap();
        assert_eq!(details.server.name, "VibeServer");
        assert_eq!(details.server.description, format!("{}...", "d".repeat(50)));
        assert_eq!(details.tools, vec!["alarm", "book", "plan"]);

        assert_eq!(store.server_details("Nobody").unwrap(), ServerDetails::default());
    }

    #[tokio::test]
    async fn test_run_blocking_reads() {
        let store = Arc::new(SnapshotStore::open_in_memory().unwrap());
        store.replace_all(&sample()).unwrap();

        let count = store.run_blocking(|store| store.row_count()).await.unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/leaderboard.db");

        {
            let store = SnapshotStore::open(&path).unwrap();
            store.replace_all(&sample()).unwrap();
        }

        let store = SnapshotStore::open(&path).unwrap();
        assert_eq!(store.row_count().unwrap(), 4);
    }

    #[test]
    fn test_readers_never_see_partial_snapshot() {
        let old: Vec<TeamRecord> = (0..20)
            .map(|i| team(&format!("old-{i}"), i, vec![submission("o", i, 0)]))
            .collect();
        let new: Vec<TeamRecord> = (0..50)
            .map(|i| {
                team(
                    &format!("new-{i}"),
                    i,
                    vec![submission("n-1", i, 0), submission("n-2", i, 0)],
                )
            })
            .collect();

        let store = Arc::new(SnapshotStore::open_in_memory().unwrap());
        store.replace_all(&old).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..200 {
                        let count = store.row_count().unwrap();
                        assert!(count == 20 || count == 100, "saw partial snapshot: {count}");
                        let names = store.team_names().unwrap();
                        let old_names = names.iter().filter(|n| n.starts_with("old-")).count();
                        assert!(old_names == 0 || old_names == names.len());
                    }
                })
            })
            .collect();

        for round in 0..20 {
            let batch = if round % 2 == 0 { &new } else { &old };
            store.replace_all(batch).unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
