// src/models/mod.rs

//! Domain models for the leaderboard cache.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod snapshot;
mod team;

// Re-export all public types
pub use config::{Config, QueryConfig, SourceConfig, StoreConfig, SyncConfig};
pub use snapshot::{
    DESCRIPTION_PREVIEW_CHARS, LISTED_TOOLS, ServerDetails, ServerInfo, SnapshotRow, StoreStats,
    TeamStanding, description_preview,
};
pub use team::{LeaderboardPage, Submission, SubmissionMetrics, TeamRecord};
