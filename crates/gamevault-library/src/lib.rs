//! Game library for GameVault
//!
//! Stores what the launcher probes find, keeps it in line with each new scan, removes
//! cross-launcher duplicates and launches games. [`GameLibrary`] is the entry point for
//! front ends; it is the only layer that touches probes, storage and the launch resolver.

mod database;
pub mod dedup;
mod icons;
mod library;
mod models;
pub mod reconcile;
mod repository;

pub use database::SqliteRepository;
pub use icons::{IconSink, NoopIconSink, RecordingIconSink};
pub use library::GameLibrary;
pub use models::{GameRecord, LauncherScan, LauncherState, ScanReport};
pub use reconcile::{AppliedMerge, MergePlan, plan_merge};
pub use repository::LibraryRepository;

pub use gamevault_detect::LauncherKind;
pub use gamevault_launch::LaunchOutcome;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Game not found: {0}")]
    GameNotFound(i64),

    #[error("{0} has no probe")]
    UnsupportedLauncher(LauncherKind),

    #[error("{0} is disabled in the configuration")]
    LauncherDisabled(LauncherKind),

    #[error("{0} probe failed")]
    ProbeFailed(LauncherKind),

    #[error("Invalid game: {0}")]
    InvalidGame(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_launcher() {
        let err = LibraryError::UnsupportedLauncher(LauncherKind::Manual);
        assert_eq!(err.to_string(), "Manually added has no probe");
        let err = LibraryError::LauncherDisabled(LauncherKind::Roblox);
        assert!(err.to_string().starts_with("Roblox"));
    }
}
