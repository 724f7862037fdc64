//! Pipeline entry points for leaderboard synchronization.
//!
//! - `SyncScheduler::seed`: fill an empty cache once at startup
//! - `SyncScheduler::run`: fetch → replace forever at a fixed interval

pub mod sync;

pub use sync::{CycleOutcome, SeedOutcome, SyncScheduler, replace_in_background};
