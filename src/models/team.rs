//! Team records as served by the remote leaderboard.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Response body of the leaderboard endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaderboardPage {
    #[serde(default)]
    pub leaderboard: Vec<TeamRecord>,
}

/// One team entry in a leaderboard snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamRecord {
    #[serde(default, deserialize_with = "string_or_empty")]
    pub team_name: String,

    #[serde(default, deserialize_with = "zero_if_null")]
    pub unique_visitors: u64,

    #[serde(default, deserialize_with = "zero_if_null")]
    pub team_size: u64,

    #[serde(default, deserialize_with = "empty_if_null")]
    pub submissions: Vec<Submission>,
}

impl TeamRecord {
    /// Sum of tool invocations across all submissions.
    pub fn invocations(&self) -> u64 {
        self.submissions.iter().map(Submission::invocations).sum()
    }
}

/// A server submitted by a team.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Submission {
    #[serde(default)]
    pub server_id: Option<String>,

    #[serde(default)]
    pub submitted_at: Option<String>,

    #[serde(default)]
    pub server_name: Option<String>,

    #[serde(default)]
    pub server_description: Option<String>,

    #[serde(default, deserialize_with = "zero_if_null")]
    pub visitors: u64,

    #[serde(default)]
    pub mcp_metrics: Option<SubmissionMetrics>,
}

impl Submission {
    pub fn invocations(&self) -> u64 {
        self.mcp_metrics
            .as_ref()
            .map_or(0, |metrics| metrics.invocations_total)
    }

    /// Names of the tools this server was called with, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        self.mcp_metrics
            .as_ref()
            .map(|metrics| metrics.tool_invocations.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Usage counters reported for a submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionMetrics {
    #[serde(default, deserialize_with = "zero_if_null")]
    pub invocations_total: u64,

    /// Per-tool counters keyed by tool name
    #[serde(default, deserialize_with = "map_or_empty")]
    pub tool_invocations: BTreeMap<String, Value>,
}

fn zero_if_null<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_if_null<'de, D>(deserializer: D) -> Result<Vec<Submission>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Submission>>::deserialize(deserializer)?.unwrap_or_default())
}

fn map_or_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page() {
        let json = r#"{
            "leaderboard": [
                {
                    "team_name": "InfiniteCoffee",
                    "unique_visitors": 1410,
                    "team_size": 3,
                    "submissions": [
                        {
                            "server_id": "srv-1",
                            "submitted_at": "2025-08-02T10:00:00Z",
                            "server_name": "VibeServer",
                            "server_description": "Mood planner\nwith extras",
                            "visitors": 900,
                            "mcp_metrics": {
                                "invocations_total": 282,
                                "tool_invocations": { "plan": 200, "about": 2, "mood": 80 }
                            }
                        },
                        {
                            "server_id": "srv-2",
                            "submitted_at": "2025-08-03T10:00:00Z",
                            "visitors": 510
                        }
                    ]
                }
            ],
            "total": 1
        }"#;

        let page: LeaderboardPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.leaderboard.len(), 1);

        let team = &page.leaderboard[0];
        assert_eq!(team.team_name, "InfiniteCoffee");
        assert_eq!(team.submissions.len(), 2);
        assert_eq!(team.submissions[1].invocations(), 0);
        assert_eq!(team.invocations(), 282);

        let latest = &team.submissions[0];
        assert_eq!(latest.server_name.as_deref(), Some("VibeServer"));
        assert_eq!(latest.tool_names(), vec!["about", "mood", "plan"]);
        assert!(team.submissions[1].tool_names().is_empty());
    }

    #[test]
    fn test_null_tool_invocations() {
        let json = r#"{ "invocations_total": 3, "tool_invocations": null }"#;
        let metrics: SubmissionMetrics = serde_json::from_str(json).unwrap();
        assert_eq!(metrics.invocations_total, 3);
        assert!(metrics.tool_invocations.is_empty());
    }

    #[test]
    fn test_nulls_become_defaults() {
        let json = r#"{
            "team_name": null,
            "unique_visitors": null,
            "team_size": 2,
            "submissions": [{ "server_id": null, "visitors": null }]
        }"#;

        let team: TeamRecord = serde_json::from_str(json).unwrap();
        assert_eq!(team.team_name, "");
        assert_eq!(team.unique_visitors, 0);
        assert_eq!(team.submissions[0].server_id, None);
        assert_eq!(team.submissions[0].visitors, 0);
    }

    #[test]
    fn test_missing_leaderboard_key() {
        let page: LeaderboardPage = serde_json::from_str(r#"{"error": "busy"}"#).unwrap();
        assert!(page.leaderboard.is_empty());
    }
}
