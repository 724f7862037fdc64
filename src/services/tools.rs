// src/services/tools.rs

//! Newline-delimited JSON tool protocol.
//!
//! Each request line is `{"tool": "<name>", "args": {...}}`. Each response
//! line carries a `status` of `success`, `info` or `error`; errors add the
//! machine-readable `kind` of the [`ToolError`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{ToolError, ToolResult};
use crate::services::leaderboard::LeaderboardService;
use crate::services::movers::MoversReport;

/// Server name reported by `about`.
pub const SERVER_NAME: &str = "Puch AI Leaderboard MCP";

const SERVER_DESCRIPTION: &str = "Leaderboard and analytics tools for the Puch AI Hackathon: \
    query the top teams, compare team stats and follow rank movement over a locally cached \
    snapshot of the public leaderboard.";

const DEFAULT_TOP_N: usize = 5;

/// Raw request envelope.
#[derive(Debug, Deserialize)]
pub struct ToolRequest {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

/// A decoded tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    GetStats { team_name: String },
    CompareTeams { team_names: String },
    TopN { n: usize },
    MilestoneCheck { team_name: String },
    Subscribe { user_id: String, team_name: String },
    MyStats { user_id: String },
    TopMovers,
    Refresh,
    DatabaseStatus,
    Validate,
    About,
}

#[derive(Deserialize)]
struct TeamArgs {
    team_name: String,
}

#[derive(Deserialize)]
struct CompareArgs {
    team_names: String,
}

#[derive(Deserialize)]
struct TopNArgs {
    #[serde(default = "default_top_n")]
    n: usize,
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

#[derive(Deserialize)]
struct SubscribeArgs {
    user_id: String,
    team_name: String,
}

#[derive(Deserialize)]
struct UserArgs {
    user_id: String,
}

impl ToolCall {
    /// Decode one request line.
    pub fn parse(line: &str) -> ToolResult<Self> {
        let request: ToolRequest = serde_json::from_str(line)
            .map_err(|e| ToolError::validation(format!("Malformed request: {e}")))?;
        Self::from_request(request)
    }

    /// Decode the arguments of an already-parsed envelope.
    pub fn from_request(request: ToolRequest) -> ToolResult<Self> {
        let args = match request.args {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        let call = match request.tool.as_str() {
            "get_leaderboard_stats" => {
                let TeamArgs { team_name } = decode_args(&request.tool, args)?;
                ToolCall::GetStats { team_name }
            }
            "compare_teams" => {
                let CompareArgs { team_names } = decode_args(&request.tool, args)?;
                ToolCall::CompareTeams { team_names }
            }
            "top_n_leaderboard" => {
                let TopNArgs { n } = decode_args(&request.tool, args)?;
                ToolCall::TopN { n }
            }
            "milestone_alert" => {
                let TeamArgs { team_name } = decode_args(&request.tool, args)?;
                ToolCall::MilestoneCheck { team_name }
            }
            "subscribe_team" => {
                let SubscribeArgs { user_id, team_name } = decode_args(&request.tool, args)?;
                ToolCall::Subscribe { user_id, team_name }
            }
            "my_team_stats" => {
                let UserArgs { user_id } = decode_args(&request.tool, args)?;
                ToolCall::MyStats { user_id }
            }
            "top_movers" => ToolCall::TopMovers,
            "refresh_leaderboard" => ToolCall::Refresh,
            "database_status" => ToolCall::DatabaseStatus,
            "validate" => ToolCall::Validate,
            "about" => ToolCall::About,
            other => return Err(ToolError::validation(format!("Unknown tool: {other}"))),
        };

        Ok(call)
    }

    /// Wire name of the tool.
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::GetStats { .. } => "get_leaderboard_stats",
            ToolCall::CompareTeams { .. } => "compare_teams",
            ToolCall::TopN { .. } => "top_n_leaderboard",
            ToolCall::MilestoneCheck { .. } => "milestone_alert",
            ToolCall::Subscribe { .. } => "subscribe_team",
            ToolCall::MyStats { .. } => "my_team_stats",
            ToolCall::TopMovers => "top_movers",
            ToolCall::Refresh => "refresh_leaderboard",
            ToolCall::DatabaseStatus => "database_status",
            ToolCall::Validate => "validate",
            ToolCall::About => "about",
        }
    }
}

fn decode_args<T: DeserializeOwned>(tool: &str, args: Value) -> ToolResult<T> {
    serde_json::from_value(args)
        .map_err(|e| ToolError::validation(format!("Invalid arguments for {tool}: {e}")))
}

/// Run one call against the service and encode the response.
pub async fn dispatch(service: &LeaderboardService, call: ToolCall) -> Value {
    log::debug!("Dispatching tool {}", call.name());

    let response = match call {
        ToolCall::GetStats { team_name } => service.get_stats(&team_name).await.and_then(success),
        ToolCall::CompareTeams { team_names } => {
            service.compare_teams(&team_names).await.and_then(success)
        }
        ToolCall::TopN { n } => service.top_n(n).await.and_then(success),
        ToolCall::MilestoneCheck { team_name } => {
            service.milestone_check(&team_name).await.and_then(success)
        }
        ToolCall::Subscribe { user_id, team_name } => {
            service.subscribe(&user_id, &team_name).await.and_then(success)
        }
        ToolCall::MyStats { user_id } => service.my_stats(&user_id).await.and_then(success),
        ToolCall::TopMovers => service.top_movers().await.and_then(movers_response),
        ToolCall::Refresh => service.refresh().await.and_then(success),
        ToolCall::DatabaseStatus => service.database_status().await.and_then(success),
        ToolCall::Validate => success(json!({ "identity": service.identity() })),
        ToolCall::About => success(json!({
            "name": SERVER_NAME,
            "description": SERVER_DESCRIPTION,
        })),
    };

    response.unwrap_or_else(|error| error_response(&error))
}

/// Decode, run and encode one request line.
pub async fn handle_line(service: &LeaderboardService, line: &str) -> Value {
    match ToolCall::parse(line) {
        Ok(call) => dispatch(service, call).await,
        Err(error) => error_response(&error),
    }
}

/// `{"status": "error", "kind": ..., "message": ...}`
pub fn error_response(error: &ToolError) -> Value {
    json!({
        "status": "error",
        "kind": error.kind(),
        "message": error.to_string(),
    })
}

fn success<T: Serialize>(payload: T) -> ToolResult<Value> {
    with_status("success", payload)
}

fn with_status<T: Serialize>(status: &str, payload: T) -> ToolResult<Value> {
    let value = serde_json::to_value(payload)
        .map_err(|e| ToolError::store_failure(format!("Failed to encode result: {e}")))?;

    let mut object = match value {
        Value::Object(object) => object,
        other => {
            let mut object = Map::new();
            object.insert("result".to_string(), other);
            object
        }
    };
    object.insert("status".to_string(), Value::String(status.to_string()));
    Ok(Value::Object(object))
}

fn movers_response(report: MoversReport) -> ToolResult<Value> {
    match report {
        MoversReport::TrackingStarted => with_status(
            "info",
            json!({ "message": "Tracking started. Please check again after the next update." }),
        ),
        MoversReport::Movements(movements) if movements.is_empty() => success(json!({
            "movements": movements,
            "message": "No significant changes since last update",
        })),
        MoversReport::Movements(movements) => success(json!({ "movements": movements })),
    }
}
