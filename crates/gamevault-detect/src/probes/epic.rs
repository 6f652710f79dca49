//! Epic Games Launcher: JSON `.item` manifests

use super::{data_missing, finish, not_installed};
use crate::helpers::{self, DefaultPath, RegistryProbe};
use crate::{DetectedGame, DetectionResult, InstallLocation, LauncherKind, LauncherProbe, ProbeContext, ProbeIssue};
use gamevault_platform::{KnownFolder, SystemAccess, file_name_of};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULTS: &[DefaultPath] = &[
    (KnownFolder::ProgramFilesX86, "Epic Games/Launcher"),
    (KnownFolder::ProgramFiles, "Epic Games/Launcher"),
];

const APP_DATA: RegistryProbe = RegistryProbe::new(r"SOFTWARE\Epic Games\EpicGamesLauncher", "AppDataPath");

const REGISTRY: &[RegistryProbe] = &[APP_DATA];

const MANIFEST_DIR: &str = "Epic/EpicGamesLauncher/Data/Manifests";

const LAUNCHER_DISPLAY_NAME: &str = "Epic Games Launcher";

/// The subset of an `.item` manifest the probe reads
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct EpicManifest {
    display_name: String,
    app_name: String,
    install_location: String,
    launch_executable: String,
    catalog_namespace: String,
    catalog_item_id: String,
    main_game_catalog_namespace: String,
    main_game_app_name: String,
    app_categories: Vec<String>,
    #[serde(rename = "bIsIncompleteInstall")]
    is_incomplete_install: bool,
}

impl EpicManifest {
    /// Why this manifest is not a standalone, complete game
    fn rejection(&self) -> Option<&'static str> {
        if self.is_incomplete_install {
            return Some("incomplete install");
        }
        if self
            .app_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case("addons") || c.eq_ignore_ascii_case("dlc"))
        {
            return Some("add-on content");
        }
        if !self.main_game_catalog_namespace.is_empty()
            && !self.catalog_namespace.eq_ignore_ascii_case(&self.main_game_catalog_namespace)
        {
            return Some("belongs to another catalog namespace");
        }
        if !self.main_game_app_name.is_empty() && self.main_game_app_name != self.app_name {
            return Some("belongs to another game");
        }
        None
    }

    fn launch_uri(&self) -> String {
        if self.catalog_namespace.is_empty() || self.catalog_item_id.is_empty() {
            format!(
                "com.epicgames.launcher://apps/{}?action=launch&silent=true",
                self.app_name
            )
        } else {
            format!(
                "com.epicgames.launcher://apps/{}%3A{}%3A{}?action=launch&silent=true",
                self.catalog_namespace, self.catalog_item_id, self.app_name
            )
        }
    }
}

pub struct EpicProbe {
    ctx: ProbeContext,
}

impl EpicProbe {
    pub fn new(ctx: ProbeContext) -> Self {
        Self { ctx }
    }

    fn system(&self) -> &dyn SystemAccess {
        self.ctx.system.as_ref()
    }

    /// `Data\Manifests`, via the launcher's own registry value when present
    fn manifest_dir(&self) -> Option<PathBuf> {
        let from_registry = helpers::read_registry_value(self.system(), APP_DATA.key, APP_DATA.value)
            .map(|data| helpers::join_relative(Path::new(&data), "Manifests"));
        let from_default = self
            .system()
            .known_folder(KnownFolder::ProgramData)
            .map(|data| helpers::join_relative(&data, MANIFEST_DIR));

        from_registry
            .into_iter()
            .chain(from_default)
            .find(|dir| self.system().is_dir(dir))
    }

    fn game_from_manifest(&self, path: &Path) -> Result<Option<DetectedGame>, ProbeIssue> {
        let file_name = file_name_of(&path.to_string_lossy()).to_string();
        let text = self
            .system()
            .read_to_string(path)
            .map_err(|e| ProbeIssue::parse(&file_name, e))?;
        let manifest: EpicManifest =
            serde_json::from_str(&text).map_err(|e| ProbeIssue::parse(&file_name, e))?;

        if manifest.app_name.trim().is_empty() {
            return Err(ProbeIssue::parse(&file_name, "missing AppName"));
        }
        if let Some(reason) = manifest.rejection() {
            tracing::debug!("Skipping Epic manifest {}: {}", manifest.app_name, reason);
            return Ok(None);
        }

        let title = if manifest.display_name.trim().is_empty() {
            manifest.app_name.clone()
        } else {
            helpers::clean_title(&manifest.display_name)
        };

        let install_dir = PathBuf::from(manifest.install_location.trim());
        let fallback = helpers::validate_install(self.system(), &install_dir, &title)?;

        // Prefer the executable the manifest names when it is really there
        let declared = helpers::join_relative(&install_dir, &manifest.launch_executable);
        let executable = if !manifest.launch_executable.is_empty()
            && self.system().is_file(&declared)
            && !helpers::is_utility_executable(file_name_of(&manifest.launch_executable))
        {
            declared
        } else {
            fallback
        };

        Ok(Some(
            DetectedGame::new(title)
                .with_external_id(manifest.app_name.trim())
                .with_install_path(install_dir)
                .with_icon_hint(executable.clone())
                .with_executable(executable)
                .with_launch_command(manifest.launch_uri()),
        ))
    }
}

impl LauncherProbe for EpicProbe {
    fn launcher(&self) -> LauncherKind {
        LauncherKind::EpicGames
    }

    fn resolve_install_path(&self) -> Option<InstallLocation> {
        let system = self.system();
        helpers::locate_install_dir(system, REGISTRY, &[])
            .or_else(|| {
                helpers::uninstall_entries(system)
                    .into_iter()
                    .filter(|entry| {
                        entry
                            .display_name
                            .as_deref()
                            .is_some_and(|name| name.eq_ignore_ascii_case(LAUNCHER_DISPLAY_NAME))
                    })
                    .filter_map(|entry| entry.install_location)
                    .find_map(|location| helpers::existing_dir(system, &location))
            })
            .or_else(|| helpers::first_existing_default(system, DEFAULTS))
            .map(InstallLocation::Path)
    }

    fn detect_games(&self) -> DetectionResult {
        let Some(location) = self.resolve_install_path() else {
            return not_installed(self.launcher());
        };

        let Some(manifest_dir) = self.manifest_dir() else {
            return data_missing(self.launcher(), location, "manifest directory");
        };

        let mut games = Vec::new();
        let mut issues = Vec::new();
        for path in self.system().glob(&manifest_dir, "*.item") {
            match self.game_from_manifest(&path) {
                Ok(Some(game)) => games.push(game),
                Ok(None) => {}
                Err(issue) => issues.push(issue),
            }
        }

        finish(self.launcher(), location, games, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamevault_platform::mock::MemorySystem;
    use gamevault_platform::{Hive, RegistryView};
    use std::sync::Arc;

    const MANIFESTS: &str = r"C:\ProgramData\Epic\EpicGamesLauncher\Data\Manifests";

    fn item(app: &str, name: &str, dir: &str, extra: &str) -> String {
        format!(
            r#"{{
  "FormatVersion": 0,
  "bIsIncompleteInstall": false,
  "LaunchExecutable": "{app}.exe",
  "DisplayName": "{name}",
  "InstallLocation": "{dir}",
  "CatalogNamespace": "ns{app}",
  "CatalogItemId": "item{app}",
  "AppName": "{app}",
  "MainGameCatalogNamespace": "ns{app}",
  "AppCategories": ["public", "games", "applications"]{extra}
}}"#,
            dir = dir.replace('\\', "\\\\")
        )
    }

    fn epic_machine() -> MemorySystem {
        MemorySystem::windows_layout()
            .with_file(
                r"C:\Program Files (x86)\Epic Games\Launcher\Portal\Binaries\Win64\EpicGamesLauncher.exe",
                "MZ",
            )
            .with_file(
                format!(r"{}\Fortnite.item", MANIFESTS),
                item("Fortnite", "Fortnite", r"C:\Epic\Fortnite", ""),
            )
            .with_file(r"C:\Epic\Fortnite\Fortnite.exe", "MZ")
    }

    fn probe(system: MemorySystem) -> EpicProbe {
        EpicProbe::new(ProbeContext::new(Arc::new(system)))
    }

    #[test]
    fn test_detects_manifest_games() {
        let result = probe(epic_machine()).detect_games();
        assert!(result.installed);
        assert_eq!(result.games.len(), 1);

        let game = &result.games[0];
        assert_eq!(game.external_id.as_deref(), Some("Fortnite"));
        assert_eq!(
            game.launch_command.as_deref(),
            Some("com.epicgames.launcher://apps/nsFortnite%3AitemFortnite%3AFortnite?action=launch&silent=true")
        );
        assert_eq!(game.executable_path, Some(PathBuf::from(r"C:\Epic\Fortnite").join("Fortnite.exe")));
    }

    #[test]
    fn test_registry_data_path_locates_relocated_launcher() {
        let system = MemorySystem::windows_layout()
            .with_registry_value(
                Hive::CurrentUser,
                RegistryView::Default,
                r"SOFTWARE\Epic Games\EpicGamesLauncher",
                "AppDataPath",
                r"D:\EpicData",
            )
            .with_file(
                r"D:\EpicData\Manifests\Fortnite.item",
                item("Fortnite", "Fortnite", r"D:\Games\Fortnite", ""),
            )
            .with_file(r"D:\Games\Fortnite\Fortnite.exe", "MZ");

        let probe = probe(system);
        assert_eq!(
            probe.resolve_install_path(),
            Some(InstallLocation::Path(PathBuf::from(r"D:\EpicData")))
        );

        let result = probe.detect_games();
        assert!(result.installed);
        assert!(result.complete);
        assert_eq!(result.games.len(), 1);
    }

    #[test]
    fn test_rejects_dlc_incomplete_and_foreign_namespace() {
        let system = epic_machine()
            .with_file(
                format!(r"{}\dlc.item", MANIFESTS),
                item("Pack", "Skin Pack", r"C:\Epic\Fortnite", r#", "MainGameAppName": "Fortnite""#),
            )
            .with_file(
                format!(r"{}\partial.item", MANIFESTS),
                item("Half", "Half Done", r"C:\Epic\Half", "")
                    .replace(r#""bIsIncompleteInstall": false"#, r#""bIsIncompleteInstall": true"#),
            )
            .with_file(
                format!(r"{}\addon.item", MANIFESTS),
                item("Addon", "Addon", r"C:\Epic\Addon", "")
                    .replace(r#""games", "applications""#, r#""addons""#),
            );

        let result = probe(system).detect_games();
        assert_eq!(result.games.len(), 1);
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_corrupt_manifest_is_an_issue_not_a_failure() {
        let system = epic_machine()
            .with_file(format!(r"{}\broken.item", MANIFESTS), "{ not json")
            .with_file(
                format!(r"{}\gone.item", MANIFESTS),
                item("Gone", "Gone", r"C:\Epic\Gone", ""),
            );

        let result = probe(system).detect_games();
        assert_eq!(result.games.len(), 1);
        assert_eq!(result.issues.len(), 2);
    }

    #[test]
    fn test_launcher_without_manifests() {
        let system = MemorySystem::windows_layout().with_dir(r"C:\Program Files (x86)\Epic Games\Launcher");
        let result = probe(system).detect_games();
        assert!(result.installed);
        assert!(result.games.is_empty());
        assert!(!result.complete);
        assert_eq!(result.diagnostic.as_deref(), Some("1 candidate(s) skipped; manifest directory missing"));
    }
}
