//! SQLite-backed library repository

use crate::LibraryError;
use crate::dedup::normalize_executable;
use crate::models::{GameRecord, LauncherState};
use crate::reconcile::{AppliedMerge, MergePlan};
use crate::repository::LibraryRepository;
use chrono::{DateTime, Utc};
use gamevault_detect::LauncherKind;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const GAME_COLUMNS: &str = "id, launcher, name, install_path, executable_path, launch_command, \
                            icon_path, last_played, date_added, external_id";

/// Library repository stored in one SQLite file
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open or create a database
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.init_schema()?;

        tracing::debug!("Opened library database {}", path.display());
        Ok(repo)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, LibraryError> {
        let conn = Connection::open_in_memory()?;

        let repo = Self {
            conn: Mutex::new(conn),
        };
        repo.init_schema()?;

        Ok(repo)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, LibraryError> {
        self.conn
            .lock()
            .map_err(|_| LibraryError::Database("connection lock poisoned".to_string()))
    }

    /// Initialize database schema and seed one state row per probed launcher
    fn init_schema(&self) -> Result<(), LibraryError> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS launchers (
                launcher TEXT PRIMARY KEY,
                installed INTEGER NOT NULL DEFAULT 0,
                install_path TEXT,
                last_scan TEXT
            );

            CREATE TABLE IF NOT EXISTS games (
                id INTEGER PRIMARY KEY,
                launcher TEXT NOT NULL,
                name TEXT NOT NULL,
                install_path TEXT,
                executable_path TEXT,
                launch_command TEXT,
                icon_path TEXT,
                last_played TEXT,
                date_added TEXT NOT NULL,
                external_id TEXT
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_games_launcher_external
                ON games(launcher, external_id) WHERE external_id IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_games_launcher ON games(launcher);
            CREATE INDEX IF NOT EXISTS idx_games_name ON games(name);
            CREATE INDEX IF NOT EXISTS idx_games_last_played ON games(last_played);
        "#,
        )?;

        for kind in LauncherKind::probed() {
            conn.execute(
                "INSERT OR IGNORE INTO launchers (launcher, installed) VALUES (?1, 0)",
                params![kind.key()],
            )?;
        }

        Ok(())
    }

    fn query_games(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<GameRecord>, LibraryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;

        let games = stmt
            .query_map(params, row_to_game)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(games)
    }

    /// Get total game count
    pub fn game_count(&self) -> Result<i64, LibraryError> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl LibraryRepository for SqliteRepository {
    fn launcher_state(&self, launcher: LauncherKind) -> Result<Option<LauncherState>, LibraryError> {
        let state = self
            .conn()?
            .query_row(
                "SELECT launcher, installed, install_path, last_scan FROM launchers WHERE launcher = ?1",
                params![launcher.key()],
                row_to_state,
            )
            .optional()?;

        Ok(state)
    }

    fn upsert_launcher_state(&self, state: &LauncherState) -> Result<(), LibraryError> {
        self.conn()?.execute(
            r#"INSERT INTO launchers (launcher, installed, install_path, last_scan)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(launcher) DO UPDATE SET
                   installed = excluded.installed,
                   install_path = excluded.install_path,
                   last_scan = excluded.last_scan"#,
            params![
                state.launcher.key(),
                state.installed,
                state.install_path,
                state.last_scan,
            ],
        )?;
        Ok(())
    }

    fn launcher_states(&self) -> Result<Vec<LauncherState>, LibraryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT launcher, installed, install_path, last_scan FROM launchers")?;

        let mut states = stmt
            .query_map([], row_to_state)?
            .collect::<Result<Vec<_>, _>>()?;
        states.sort_by_key(|state| state.launcher);

        Ok(states)
    }

    fn game(&self, id: i64) -> Result<Option<GameRecord>, LibraryError> {
        let game = self
            .conn()?
            .query_row(
                &format!("SELECT {} FROM games WHERE id = ?1", GAME_COLUMNS),
                params![id],
                row_to_game,
            )
            .optional()?;

        Ok(game)
    }

    fn insert_game(&self, game: &GameRecord) -> Result<i64, LibraryError> {
        Ok(insert_on(&*self.conn()?, game)?)
    }

    fn update_game(&self, game: &GameRecord) -> Result<(), LibraryError> {
        match update_on(&*self.conn()?, game)? {
            0 => Err(LibraryError::GameNotFound(game.id)),
            _ => Ok(()),
        }
    }

    fn delete_game(&self, id: i64) -> Result<bool, LibraryError> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM games WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn delete_games(&self, ids: &[i64]) -> Result<usize, LibraryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut deleted = 0;
        for id in ids {
            deleted += tx.execute("DELETE FROM games WHERE id = ?1", params![id])?;
        }
        tx.commit()?;

        Ok(deleted)
    }

    fn games_by_launcher(&self, launcher: LauncherKind) -> Result<Vec<GameRecord>, LibraryError> {
        self.query_games(
            &format!("SELECT {} FROM games WHERE launcher = ?1 ORDER BY id", GAME_COLUMNS),
            params![launcher.key()],
        )
    }

    fn game_by_external_id(
        &self,
        launcher: LauncherKind,
        external_id: &str,
    ) -> Result<Option<GameRecord>, LibraryError> {
        let game = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT {} FROM games WHERE launcher = ?1 AND external_id = ?2",
                    GAME_COLUMNS
                ),
                params![launcher.key(), external_id.trim()],
                row_to_game,
            )
            .optional()?;

        Ok(game)
    }

    fn games_by_executable(&self, path: &str) -> Result<Vec<GameRecord>, LibraryError> {
        let Some(wanted) = normalize_executable(path) else {
            return Ok(Vec::new());
        };

        let games = self.query_games(
            &format!(
                "SELECT {} FROM games WHERE executable_path IS NOT NULL ORDER BY id",
                GAME_COLUMNS
            ),
            [],
        )?;

        Ok(games
            .into_iter()
            .filter(|game| {
                game.executable_path
                    .as_deref()
                    .and_then(normalize_executable)
                    .is_some_and(|key| key == wanted)
            })
            .collect())
    }

    fn search_by_name(&self, text: &str) -> Result<Vec<GameRecord>, LibraryError> {
        let pattern = format!("%{}%", escape_like(text.trim()));
        self.query_games(
            &format!(
                "SELECT {} FROM games WHERE name LIKE ?1 ESCAPE '\\' ORDER BY name COLLATE NOCASE, id",
                GAME_COLUMNS
            ),
            params![pattern],
        )
    }

    fn list_games(&self) -> Result<Vec<GameRecord>, LibraryError> {
        self.query_games(
            &format!("SELECT {} FROM games ORDER BY name COLLATE NOCASE, id", GAME_COLUMNS),
            [],
        )
    }

    fn recent_games(&self, limit: usize) -> Result<Vec<GameRecord>, LibraryError> {
        self.query_games(
            &format!(
                r#"SELECT {} FROM games
                   WHERE last_played IS NOT NULL
                   ORDER BY last_played DESC, id DESC
                   LIMIT ?1"#,
                GAME_COLUMNS
            ),
            params![i64::try_from(limit).unwrap_or(i64::MAX)],
        )
    }

    fn set_last_played(&self, id: i64, at: DateTime<Utc>) -> Result<(), LibraryError> {
        let updated = self
            .conn()?
            .execute("UPDATE games SET last_played = ?1 WHERE id = ?2", params![at, id])?;
        match updated {
            0 => Err(LibraryError::GameNotFound(id)),
            _ => Ok(()),
        }
    }

    fn apply_merge(&self, plan: &MergePlan) -> Result<AppliedMerge, LibraryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut applied = AppliedMerge::default();

        for game in &plan.inserts {
            applied.inserted.push(insert_on(&tx, game)?);
        }
        for game in &plan.updates {
            if update_on(&tx, game)? > 0 {
                applied.updated.push(game.id);
            }
        }
        for id in &plan.deletes {
            applied.deleted += tx.execute(
                "DELETE FROM games WHERE id = ?1 AND launcher = ?2",
                params![id, plan.launcher.key()],
            )?;
        }

        tx.commit()?;
        Ok(applied)
    }
}

/// Insert, or refresh the row holding the same `(launcher, external_id)`
fn insert_on(conn: &Connection, game: &GameRecord) -> rusqlite::Result<i64> {
    conn.query_row(
        r#"INSERT INTO games
           (launcher, name, install_path, executable_path, launch_command,
            icon_path, last_played, date_added, external_id)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
           ON CONFLICT(launcher, external_id) WHERE external_id IS NOT NULL DO UPDATE SET
               name = excluded.name,
               install_path = excluded.install_path,
               executable_path = excluded.executable_path,
               launch_command = excluded.launch_command,
               icon_path = COALESCE(excluded.icon_path, games.icon_path)
           RETURNING id"#,
        params![
            game.launcher.key(),
            game.name,
            game.install_path,
            game.executable_path,
            game.launch_command,
            game.icon_path,
            game.last_played,
            game.date_added,
            game.join_key(),
        ],
        |row| row.get(0),
    )
}

fn update_on(conn: &Connection, game: &GameRecord) -> rusqlite::Result<usize> {
    conn.execute(
        r#"UPDATE games SET
               launcher = ?1, name = ?2, install_path = ?3, executable_path = ?4,
               launch_command = ?5, icon_path = ?6, last_played = ?7, date_added = ?8,
               external_id = ?9
           WHERE id = ?10"#,
        params![
            game.launcher.key(),
            game.name,
            game.install_path,
            game.executable_path,
            game.launch_command,
            game.icon_path,
            game.last_played,
            game.date_added,
            game.join_key(),
            game.id,
        ],
    )
}

fn launcher_column(row: &Row, column: &str) -> rusqlite::Result<LauncherKind> {
    let key: String = row.get(column)?;
    key.parse().map_err(|e| {
        let index = row.as_ref().column_index(column).unwrap_or(0);
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
    })
}

/// Convert a row to a GameRecord
fn row_to_game(row: &Row) -> rusqlite::Result<GameRecord> {
    Ok(GameRecord {
        id: row.get("id")?,
        launcher: launcher_column(row, "launcher")?,
        name: row.get("name")?,
        install_path: row.get("install_path")?,
        executable_path: row.get("executable_path")?,
        launch_command: row.get("launch_command")?,
        icon_path: row.get("icon_path")?,
        last_played: row.get("last_played")?,
        date_added: row.get("date_added")?,
        external_id: row.get("external_id")?,
    })
}

fn row_to_state(row: &Row) -> rusqlite::Result<LauncherState> {
    Ok(LauncherState {
        launcher: launcher_column(row, "launcher")?,
        installed: row.get("installed")?,
        install_path: row.get("install_path")?,
        last_scan: row.get("last_scan")?,
    })
}

/// Escape `%`, `_` and the escape character itself for a LIKE pattern
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
