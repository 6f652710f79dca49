//! GOG Galaxy: registry game keys enriched by `goggame-<id>.info`

use super::{finish, not_installed, quoted};
use crate::helpers::{self, DefaultPath, RegistryProbe};
use crate::{DetectedGame, DetectionResult, InstallLocation, LauncherKind, LauncherProbe, ProbeContext, ProbeIssue};
use gamevault_platform::{KnownFolder, SystemAccess, file_name_of, path_key};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const REGISTRY: &[RegistryProbe] = &[
    RegistryProbe::new(r"SOFTWARE\GOG.com\GalaxyClient\paths", "client"),
    RegistryProbe::new(r"SOFTWARE\GOG.com\GalaxyClient", "clientExecutable"),
];

const DEFAULTS: &[DefaultPath] = &[
    (KnownFolder::ProgramFilesX86, "GOG Galaxy"),
    (KnownFolder::ProgramFiles, "GOG Galaxy"),
];

const GAMES_KEY: &str = r"SOFTWARE\GOG.com\Games";

/// Library folders used when a game has no registry entry
const LIBRARY_ROOTS: &[DefaultPath] = &[
    (KnownFolder::ProgramFilesX86, "GOG Galaxy/Games"),
    (KnownFolder::ProgramFiles, "GOG Galaxy/Games"),
    (KnownFolder::ProgramFilesX86, "GOG Games"),
];

const CLIENT_EXE: &str = "GalaxyClient.exe";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GameInfo {
    game_id: String,
    root_game_id: String,
    name: String,
    play_tasks: Vec<PlayTask>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PlayTask {
    is_primary: bool,
    path: String,
    category: String,
}

impl GameInfo {
    fn is_dlc(&self) -> bool {
        !self.root_game_id.is_empty() && self.root_game_id != self.game_id
    }

    fn primary_path(&self) -> Option<&str> {
        self.play_tasks
            .iter()
            .find(|task| task.is_primary && !task.path.is_empty())
            .or_else(|| {
                self.play_tasks
                    .iter()
                    .find(|task| task.category.eq_ignore_ascii_case("game") && !task.path.is_empty())
            })
            .map(|task| task.path.as_str())
    }
}

/// Registry facts about one game
#[derive(Debug, Clone, Default)]
struct GameEntry {
    id: String,
    name: Option<String>,
    dir: PathBuf,
    exe: Option<String>,
}

pub struct GogProbe {
    ctx: ProbeContext,
}

impl GogProbe {
    pub fn new(ctx: ProbeContext) -> Self {
        Self { ctx }
    }

    fn system(&self) -> &dyn SystemAccess {
        self.ctx.system.as_ref()
    }

    fn registry_entries(&self, issues: &mut Vec<ProbeIssue>) -> Vec<GameEntry> {
        let system = self.system();
        let mut entries = Vec::new();

        for (_, _, id) in helpers::registry_subkeys_all(system, GAMES_KEY) {
            let key = format!(r"{}\{}", GAMES_KEY, id);
            let read = |value: &str| helpers::read_registry_value(system, &key, value);

            if read("dependsOn").is_some() {
                tracing::debug!("Skipping GOG DLC {}", id);
                continue;
            }
            let Some(dir) = read("path") else {
                issues.push(ProbeIssue::parse(format!("GOG game {}", id), "missing path"));
                continue;
            };

            entries.push(GameEntry {
                name: read("gameName"),
                exe: read("exe"),
                dir: PathBuf::from(dir),
                id,
            });
        }

        entries
    }

    /// Installs in library folders that carry an info file but no registry key
    fn library_entries(&self, known: &HashSet<String>) -> Vec<GameEntry> {
        let system = self.system();
        let mut entries = Vec::new();

        for root in helpers::heuristic_roots(system, LIBRARY_ROOTS, &[], false) {
            for child in system.list_dir(&root).unwrap_or_default() {
                if !child.is_dir {
                    continue;
                }
                let Some(info) = system.glob(&child.path, "goggame-*.info").into_iter().next() else {
                    continue;
                };
                let info_name = file_name_of(&info.to_string_lossy()).to_string();
                let id = info_name
                    .trim_start_matches("goggame-")
                    .trim_end_matches(".info")
                    .to_string();
                if !id.is_empty() && !known.contains(&id) {
                    entries.push(GameEntry {
                        id,
                        dir: child.path,
                        ..Default::default()
                    });
                }
            }
        }

        entries
    }

    fn read_info(&self, entry: &GameEntry) -> Result<Option<GameInfo>, ProbeIssue> {
        let path = entry.dir.join(format!("goggame-{}.info", entry.id));
        let Ok(text) = self.system().read_to_string(&path) else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ProbeIssue::parse(format!("goggame-{}.info", entry.id), e))
    }

    fn game_from_entry(
        &self,
        entry: &GameEntry,
        client: Option<&Path>,
    ) -> Result<Option<DetectedGame>, ProbeIssue> {
        let info = self.read_info(entry)?;
        if info.as_ref().is_some_and(GameInfo::is_dlc) {
            tracing::debug!("Skipping GOG DLC {}", entry.id);
            return Ok(None);
        }

        let title = info
            .as_ref()
            .map(|info| info.name.clone())
            .filter(|name| !name.trim().is_empty())
            .or_else(|| entry.name.clone())
            .map(|name| helpers::clean_title(&name))
            .unwrap_or_else(|| helpers::folder_title(&entry.dir));

        let fallback = helpers::validate_install(self.system(), &entry.dir, &title)?;
        let declared = info
            .as_ref()
            .and_then(GameInfo::primary_path)
            .map(|relative| helpers::join_relative(&entry.dir, relative))
            .or_else(|| entry.exe.as_ref().map(PathBuf::from));
        let executable = declared
            .filter(|path| self.system().is_file(path))
            .filter(|path| !helpers::is_utility_executable(file_name_of(&path.to_string_lossy())))
            .unwrap_or(fallback);

        let mut game = DetectedGame::new(title)
            .with_external_id(&entry.id)
            .with_install_path(entry.dir.clone())
            .with_icon_hint(executable.clone())
            .with_executable(executable);

        if let Some(client) = client {
            game = game.with_launch_command(format!(
                "{} /command=runGame /gameId={} /path={}",
                quoted(&client.join(CLIENT_EXE)),
                entry.id,
                quoted(&entry.dir)
            ));
        }

        Ok(Some(game))
    }
}

impl LauncherProbe for GogProbe {
    fn launcher(&self) -> LauncherKind {
        LauncherKind::GogGalaxy
    }

    fn resolve_install_path(&self) -> Option<InstallLocation> {
        helpers::locate_install_dir(self.system(), REGISTRY, DEFAULTS).map(InstallLocation::Path)
    }

    fn detect_games(&self) -> DetectionResult {
        let Some(location) = self.resolve_install_path() else {
            return not_installed(self.launcher());
        };
        let client = location.as_path().cloned();

        let mut issues = Vec::new();
        let mut entries = self.registry_entries(&mut issues);
        let known: HashSet<String> = entries.iter().map(|entry| entry.id.clone()).collect();
        entries.extend(self.library_entries(&known));

        let mut games = Vec::new();
        let mut seen_dirs = HashSet::new();
        for entry in &entries {
            if !seen_dirs.insert(path_key(&entry.dir)) {
                continue;
            }
            match self.game_from_entry(entry, client.as_deref()) {
                Ok(Some(game)) => games.push(game),
                Ok(None) => {}
                Err(issue) => issues.push(issue),
            }
        }

        finish(self.launcher(), location, games, issues)
    }
}
