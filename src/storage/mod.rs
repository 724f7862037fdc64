//! Storage for the leaderboard snapshot.
//!
//! The cache is disposable: it holds only the latest snapshot and is rebuilt
//! from the remote source on every sync.

pub mod sqlite;

// Re-export for convenience
pub use sqlite::{ReplaceSummary, SnapshotStore};
