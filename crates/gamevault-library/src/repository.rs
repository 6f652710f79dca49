//! Storage abstraction used by the library

use crate::LibraryError;
use crate::models::{GameRecord, LauncherState};
use crate::reconcile::{AppliedMerge, MergePlan};
use chrono::{DateTime, Utc};
use gamevault_detect::LauncherKind;

/// Persistent store for launcher states and game records
///
/// Implementations keep their own consistency; callers never hold a lock across probe I/O.
pub trait LibraryRepository: Send + Sync {
    fn launcher_state(&self, launcher: LauncherKind) -> Result<Option<LauncherState>, LibraryError>;

    fn upsert_launcher_state(&self, state: &LauncherState) -> Result<(), LibraryError>;

    fn launcher_states(&self) -> Result<Vec<LauncherState>, LibraryError>;

    fn game(&self, id: i64) -> Result<Option<GameRecord>, LibraryError>;

    /// Insert a record, returning its id. The record's own `id` is ignored.
    fn insert_game(&self, game: &GameRecord) -> Result<i64, LibraryError>;

    fn update_game(&self, game: &GameRecord) -> Result<(), LibraryError>;

    /// Returns whether a record was deleted
    fn delete_game(&self, id: i64) -> Result<bool, LibraryError>;

    fn delete_games(&self, ids: &[i64]) -> Result<usize, LibraryError>;

    fn games_by_launcher(&self, launcher: LauncherKind) -> Result<Vec<GameRecord>, LibraryError>;

    fn game_by_external_id(
        &self,
        launcher: LauncherKind,
        external_id: &str,
    ) -> Result<Option<GameRecord>, LibraryError>;

    /// Records whose executable matches `path` case- and separator-insensitively
    fn games_by_executable(&self, path: &str) -> Result<Vec<GameRecord>, LibraryError>;

    /// Case-insensitive name substring search
    fn search_by_name(&self, text: &str) -> Result<Vec<GameRecord>, LibraryError>;

    fn list_games(&self) -> Result<Vec<GameRecord>, LibraryError>;

    /// Most recently played first
    fn recent_games(&self, limit: usize) -> Result<Vec<GameRecord>, LibraryError>;

    fn set_last_played(&self, id: i64, at: DateTime<Utc>) -> Result<(), LibraryError>;

    /// Apply every change of `plan` or none of them
    fn apply_merge(&self, plan: &MergePlan) -> Result<AppliedMerge, LibraryError>;
}
