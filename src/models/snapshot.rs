//! Rows and aggregates read back from the snapshot cache.

use serde::{Deserialize, Serialize};

/// One cached (team, submission) row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotRow {
    pub id: i64,
    pub team_name: String,
    pub server_id: Option<String>,
    pub submitted_at: Option<String>,
    pub visitors: u64,
    pub unique_visitors: u64,
    pub team_size: u64,
    pub invocations: u64,
    pub last_updated: String,
}

/// A team's position in the grouped ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamStanding {
    /// 1-based position, highest unique visitors first
    pub rank: usize,
    pub team_name: String,
    pub unique_visitors: u64,
    pub team_size: u64,
    /// Summed over the team's submissions
    pub invocations: u64,
}

/// Aggregate view of the whole cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStats {
    pub total_rows: usize,
    pub distinct_teams: usize,
    pub top: Vec<TeamStanding>,
    pub last_updated: Option<String>,
}

/// Characters of a server description kept in listings.
pub const DESCRIPTION_PREVIEW_CHARS: usize = 50;

/// Tool names listed per team.
pub const LISTED_TOOLS: usize = 3;

/// Server a team submitted most recently.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    /// First line, cut to [`DESCRIPTION_PREVIEW_CHARS`]
    pub description: String,
}

/// Server and tool details for one team.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerDetails {
    pub server: ServerInfo,
    /// Alphabetically first [`LISTED_TOOLS`] tools across all submissions
    pub tools: Vec<String>,
}

/// First line of `description`, cut to [`DESCRIPTION_PREVIEW_CHARS`] characters.
/// An ellipsis marks descriptions longer than the limit.
pub fn description_preview(description: &str) -> String {
    let first_line = description.split('\n').next().unwrap_or_default();
    let mut preview: String = first_line.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
    if description.chars().count() > DESCRIPTION_PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_preview() {
        assert_eq!(description_preview(""), "");
        assert_eq!(description_preview("Short one"), "Short one");
        assert_eq!(description_preview("Line one\nline two"), "Line one");

        let long = "a".repeat(60);
        assert_eq!(description_preview(&long), format!("{}...", "a".repeat(50)));
    }
}
