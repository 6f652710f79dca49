//! Steam: VDF library folders and app manifests

use super::{finish, not_installed};
use crate::helpers::{self, DefaultPath, RegistryProbe};
use crate::vdf::{self, VdfNode};
use crate::{DetectedGame, DetectionResult, InstallLocation, LauncherKind, LauncherProbe, ProbeContext, ProbeIssue};
use gamevault_platform::{KnownFolder, SystemAccess, file_name_of, path_key};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const REGISTRY: &[RegistryProbe] = &[
    RegistryProbe::new(r"SOFTWARE\Valve\Steam", "InstallPath"),
    RegistryProbe::new(r"Software\Valve\Steam", "SteamPath"),
];

const DEFAULTS: &[DefaultPath] = &[
    (KnownFolder::ProgramFilesX86, "Steam"),
    (KnownFolder::ProgramFiles, "Steam"),
];

/// Runtime and redistributable apps that are not games
const TOOL_APP_IDS: &[&str] = &["228980", "1070560", "1391110", "1628350", "250820", "1493710"];

const TOOL_NAME_PATTERNS: &[&str] = &[
    "proton",
    "steam linux runtime",
    "steamvr",
    "steamworks common redistributables",
    "steamworks shared",
];

/// `StateFlags` bit set once an app is fully installed
const STATE_FULLY_INSTALLED: u64 = 4;

pub struct SteamProbe {
    ctx: ProbeContext,
}

/// Fields of `appmanifest_<id>.acf` the probe needs
#[derive(Debug, Clone, PartialEq, Eq)]
struct AppManifest {
    app_id: String,
    name: String,
    install_dir: String,
    state_flags: u64,
}

impl SteamProbe {
    pub fn new(ctx: ProbeContext) -> Self {
        Self { ctx }
    }

    fn system(&self) -> &dyn SystemAccess {
        self.ctx.system.as_ref()
    }

    /// Library roots: the install itself plus `libraryfolders.vdf` entries
    fn library_folders(&self, steam_dir: &Path, issues: &mut Vec<ProbeIssue>) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut folders = vec![steam_dir.to_path_buf()];
        seen.insert(path_key(steam_dir));

        let vdf_path = helpers::join_relative(steam_dir, "steamapps/libraryfolders.vdf");
        let Ok(text) = self.system().read_to_string(&vdf_path) else {
            return folders;
        };

        match parse_library_folders(&text) {
            Ok(paths) => {
                for path in paths {
                    if self.system().is_dir(&path) && seen.insert(path_key(&path)) {
                        folders.push(path);
                    }
                }
            }
            Err(reason) => issues.push(ProbeIssue::parse("libraryfolders.vdf", reason)),
        }

        folders
    }

    fn game_from_manifest(
        &self,
        library: &Path,
        manifest_path: &Path,
    ) -> Result<Option<DetectedGame>, ProbeIssue> {
        let file_name = file_name_of(&manifest_path.to_string_lossy()).to_string();
        let text = self
            .system()
            .read_to_string(manifest_path)
            .map_err(|e| ProbeIssue::parse(&file_name, e))?;
        let manifest = parse_app_manifest(&text).map_err(|reason| ProbeIssue::parse(&file_name, reason))?;

        if is_tool_app(&manifest) {
            tracing::debug!("Skipping Steam tool app {} ({})", manifest.name, manifest.app_id);
            return Ok(None);
        }
        if manifest.state_flags & STATE_FULLY_INSTALLED == 0 {
            return Err(ProbeIssue::rejected(
                &manifest.name,
                format!("not fully installed (StateFlags {})", manifest.state_flags),
            ));
        }

        let install_dir = library
            .join("steamapps")
            .join("common")
            .join(&manifest.install_dir);
        let name = helpers::clean_title(&manifest.name);
        let executable = helpers::validate_install(self.system(), &install_dir, &name)?;

        Ok(Some(
            DetectedGame::new(name)
                .with_external_id(&manifest.app_id)
                .with_install_path(install_dir)
                .with_icon_hint(executable.clone())
                .with_executable(executable)
                .with_launch_command(format!("steam://rungameid/{}", manifest.app_id)),
        ))
    }
}

impl LauncherProbe for SteamProbe {
    fn launcher(&self) -> LauncherKind {
        LauncherKind::Steam
    }

    fn resolve_install_path(&self) -> Option<InstallLocation> {
        helpers::locate_install_dir(self.system(), REGISTRY, DEFAULTS).map(InstallLocation::Path)
    }

    fn detect_games(&self) -> DetectionResult {
        let Some(location) = self.resolve_install_path() else {
            return not_installed(self.launcher());
        };
        let Some(steam_dir) = location.as_path().cloned() else {
            return not_installed(self.launcher());
        };

        let mut issues = Vec::new();
        let mut games = Vec::new();
        let mut seen_ids = HashSet::new();

        for library in self.library_folders(&steam_dir, &mut issues) {
            let steamapps = library.join("steamapps");
            for manifest in self.system().glob(&steamapps, "appmanifest_*.acf") {
                match self.game_from_manifest(&library, &manifest) {
                    Ok(Some(game)) => {
                        if game.join_key().is_some_and(|id| seen_ids.insert(id.to_string())) {
                            games.push(game);
                        }
                    }
                    Ok(None) => {}
                    Err(issue) => issues.push(issue),
                }
            }
        }

        finish(self.launcher(), location, games, issues)
    }
}

/// Library paths from either the modern `"path"` block form or the legacy `"1" "D:\\Lib"` form
fn parse_library_folders(text: &str) -> Result<Vec<PathBuf>, String> {
    let root = vdf::parse(text).map_err(|e| e.to_string())?;
    let folders = root
        .get("libraryfolders")
        .ok_or_else(|| "missing libraryfolders block".to_string())?;

    let paths = folders
        .entries()
        .iter()
        .filter(|(key, _)| key.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|(_, node)| match node {
            VdfNode::Value(path) => Some(path.as_str()),
            VdfNode::Block(_) => node.get_str("path"),
        })
        .map(|path| PathBuf::from(path.trim()))
        .collect();

    Ok(paths)
}

fn parse_app_manifest(text: &str) -> Result<AppManifest, String> {
    let root = vdf::parse(text).map_err(|e| e.to_string())?;
    let state = root
        .get("AppState")
        .ok_or_else(|| "missing AppState block".to_string())?;

    let field = |key: &str| {
        state
            .get_str(key)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| format!("missing {}", key))
    };

    let app_id = field("appid")?;
    let install_dir = field("installdir")?;
    let name = field("name").unwrap_or_else(|_| install_dir.clone());
    let state_flags = state
        .get_str("StateFlags")
        .and_then(|flags| flags.trim().parse().ok())
        .unwrap_or(0);

    Ok(AppManifest {
        app_id,
        name,
        install_dir,
        state_flags,
    })
}

fn is_tool_app(manifest: &AppManifest) -> bool {
    let name = manifest.name.to_lowercase();
    TOOL_APP_IDS.contains(&manifest.app_id.as_str())
        || TOOL_NAME_PATTERNS.iter().any(|pattern| name.contains(pattern))
}
