//! Roblox: per-version player folders

use super::{finish, not_installed};
use crate::helpers::{self, RegistryProbe};
use crate::{DetectedGame, DetectionResult, InstallLocation, LauncherKind, LauncherProbe, ProbeContext, ProbeIssue};
use gamevault_platform::{KnownFolder, SystemAccess};
use std::path::PathBuf;

const PLAYER_KEY: &str = r"Software\ROBLOX Corporation\Environments\roblox-player";

const REGISTRY: &[RegistryProbe] = &[RegistryProbe::new(PLAYER_KEY, "clientExe")];

const PLAYER_EXE: &str = "RobloxPlayerBeta.exe";

const VERSION_ROOTS: &[(KnownFolder, &str)] = &[
    (KnownFolder::LocalAppData, "Roblox/Versions"),
    (KnownFolder::ProgramFilesX86, "Roblox/Versions"),
];

pub const PLAYER_ID: &str = "roblox-player";

pub struct RobloxProbe {
    ctx: ProbeContext,
}

impl RobloxProbe {
    pub fn new(ctx: ProbeContext) -> Self {
        Self { ctx }
    }

    fn system(&self) -> &dyn SystemAccess {
        self.ctx.system.as_ref()
    }

    /// Newest `version-*` folder holding the player.
    ///
    /// The registry `version` value names the current folder; without it the
    /// last folder in name order is taken.
    fn newest_version_dir(&self) -> Option<PathBuf> {
        let system = self.system();
        let current = helpers::read_registry_value(system, PLAYER_KEY, "version").map(|v| v.to_lowercase());

        let mut versions: Vec<(String, PathBuf)> = VERSION_ROOTS
            .iter()
            .filter_map(|(folder, relative)| {
                system
                    .known_folder(*folder)
                    .map(|base| helpers::join_relative(&base, relative))
            })
            .flat_map(|root| system.list_dir(&root).unwrap_or_default())
            .filter(|entry| entry.is_dir && entry.name.to_lowercase().starts_with("version-"))
            .filter(|entry| system.is_file(&entry.path.join(PLAYER_EXE)))
            .map(|entry| (entry.name.to_lowercase(), entry.path))
            .collect();
        versions.sort();

        let current = current.and_then(|current| versions.iter().position(|(name, _)| *name == current));
        match current {
            Some(index) => Some(versions.swap_remove(index).1),
            None => versions.pop().map(|(_, dir)| dir),
        }
    }

    fn player_dir(&self) -> Option<PathBuf> {
        helpers::locate_install_dir(self.system(), REGISTRY, &[])
            .filter(|dir| self.system().is_file(&dir.join(PLAYER_EXE)))
            .or_else(|| self.newest_version_dir())
    }
}

impl LauncherProbe for RobloxProbe {
    fn launcher(&self) -> LauncherKind {
        LauncherKind::Roblox
    }

    fn resolve_install_path(&self) -> Option<InstallLocation> {
        self.player_dir().map(InstallLocation::Path)
    }

    fn detect_games(&self) -> DetectionResult {
        let Some(dir) = self.player_dir() else {
            return not_installed(self.launcher());
        };

        let executable = dir.join(PLAYER_EXE);
        let mut games = Vec::new();
        let mut issues = Vec::new();
        if self.system().is_file(&executable) {
            games.push(
                DetectedGame::new("Roblox")
                    .with_external_id(PLAYER_ID)
                    .with_install_path(dir.clone())
                    .with_icon_hint(executable.clone())
                    .with_executable(executable)
                    .with_launch_command("roblox-player:"),
            );
        } else {
            issues.push(ProbeIssue::rejected("Roblox", format!("{} missing", PLAYER_EXE)));
        }

        finish(self.launcher(), InstallLocation::Path(dir), games, issues)
    }
}
