//! Service layer for the leaderboard cache.
//!
//! This module contains the business logic for:
//! - Remote snapshot fetching (`LeaderboardClient`)
//! - Fuzzy team name resolution (`FuzzyResolver`)
//! - Rank movement tracking (`RankTracker`)
//! - Query operations (`LeaderboardService`)
//! - The JSON tool protocol (`tools`)

pub mod leaderboard;
pub mod movers;
pub mod resolver;
pub mod source;
pub mod tools;

pub use leaderboard::LeaderboardService;
pub use movers::{Direction, MoversReport, RankMovement, RankTracker};
pub use resolver::{FuzzyResolver, Resolution};
pub use source::{LeaderboardClient, LeaderboardSource};
pub use tools::{ToolCall, dispatch, handle_line};
