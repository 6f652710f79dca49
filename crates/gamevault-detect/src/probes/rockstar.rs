//! Rockstar Games Launcher: fixed title table probed per registry key

use super::{finish, not_installed, quoted};
use crate::helpers::{self, DefaultPath, RegistryProbe};
use crate::{DetectedGame, DetectionResult, InstallLocation, LauncherKind, LauncherProbe, ProbeContext};
use gamevault_platform::{KnownFolder, SystemAccess, path_key};
use std::collections::HashSet;

const REGISTRY: &[RegistryProbe] = &[RegistryProbe::new(r"SOFTWARE\Rockstar Games\Launcher", "InstallFolder")];

const DEFAULTS: &[DefaultPath] = &[
    (KnownFolder::ProgramFiles, "Rockstar Games/Launcher"),
    (KnownFolder::ProgramFilesX86, "Rockstar Games/Launcher"),
];

/// Title code, registry subkey under `SOFTWARE\Rockstar Games`, display title
const KNOWN_TITLES: &[(&str, &str, &str)] = &[
    ("gta5", "Grand Theft Auto V", "Grand Theft Auto V"),
    ("rdr2", "Red Dead Redemption 2", "Red Dead Redemption 2"),
    ("lanoire", "L.A. Noire", "L.A. Noire"),
    ("maxpayne3", "Max Payne 3", "Max Payne 3"),
    ("gta4", "Grand Theft Auto IV", "Grand Theft Auto IV"),
    ("bully", "Bully Scholarship Edition", "Bully: Scholarship Edition"),
    ("gtasa", "GTA San Andreas Definitive Edition", "Grand Theft Auto: San Andreas - The Definitive Edition"),
];

const LAUNCHER_EXE: &str = "Launcher.exe";

pub struct RockstarProbe {
    ctx: ProbeContext,
}

impl RockstarProbe {
    pub fn new(ctx: ProbeContext) -> Self {
        Self { ctx }
    }

    fn system(&self) -> &dyn SystemAccess {
        self.ctx.system.as_ref()
    }
}

impl LauncherProbe for RockstarProbe {
    fn launcher(&self) -> LauncherKind {
        LauncherKind::RockstarGames
    }

    fn resolve_install_path(&self) -> Option<InstallLocation> {
        helpers::locate_install_dir(self.system(), REGISTRY, DEFAULTS).map(InstallLocation::Path)
    }

    fn detect_games(&self) -> DetectionResult {
        let Some(location) = self.resolve_install_path() else {
            return not_installed(self.launcher());
        };
        let launcher_exe = location.as_path().map(|dir| dir.join(LAUNCHER_EXE));
        let system = self.system();

        let mut games = Vec::new();
        let mut issues = Vec::new();
        let mut seen = HashSet::new();

        for (code, subkey, title) in KNOWN_TITLES {
            let key = format!(r"SOFTWARE\Rockstar Games\{}", subkey);
            let registry_dir = helpers::read_registry_value(system, &key, "InstallFolder")
                .and_then(|raw| helpers::existing_dir(system, &raw));
            let default_dir = || {
                let folder = format!("Rockstar Games/{}", subkey);
                [KnownFolder::ProgramFiles, KnownFolder::ProgramFilesX86]
                    .into_iter()
                    .filter_map(|known| system.known_folder(known))
                    .map(|base| helpers::join_relative(&base, &folder))
                    .find(|dir| system.is_dir(dir))
            };
            let Some(dir) = registry_dir.or_else(default_dir) else {
                continue;
            };
            if !seen.insert(path_key(&dir)) {
                continue;
            }

            match helpers::validate_install(system, &dir, title) {
                Ok(executable) => {
                    let mut game = DetectedGame::new(*title)
                        .with_external_id(*code)
                        .with_install_path(dir.clone())
                        .with_icon_hint(executable.clone())
                        .with_executable(executable);
                    if let Some(launcher) = &launcher_exe {
                        game = game.with_launch_command(format!(
                            "{} -launchTitleInFolder {}",
                            quoted(launcher),
                            quoted(&dir)
                        ));
                    }
                    games.push(game);
                }
                Err(issue) => issues.push(issue),
            }
        }

        finish(self.launcher(), location, games, issues)
    }
}
