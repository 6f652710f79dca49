//! Ubisoft Connect: registry install keys named by numeric product id

use super::{finish, not_installed};
use crate::helpers::{self, DefaultPath, RegistryProbe};
use crate::{DetectedGame, DetectionResult, InstallLocation, LauncherKind, LauncherProbe, ProbeContext, ProbeIssue};
use gamevault_platform::{KnownFolder, SystemAccess, file_name_of};
use std::path::{Path, PathBuf};

const REGISTRY: &[RegistryProbe] = &[RegistryProbe::new(r"SOFTWARE\Ubisoft\Launcher", "InstallDir")];

const DEFAULTS: &[DefaultPath] = &[
    (KnownFolder::ProgramFilesX86, "Ubisoft/Ubisoft Game Launcher"),
    (KnownFolder::ProgramFiles, "Ubisoft/Ubisoft Game Launcher"),
];

const INSTALLS_KEY: &str = r"SOFTWARE\Ubisoft\Launcher\Installs";

const CONFIGURATIONS: &str = "cache/configuration/configurations";

/// Product ids whose titles the launcher data does not spell out
const KNOWN_TITLES: &[(&str, &str)] = &[
    ("635", "Tom Clancy's Rainbow Six Siege"),
    ("720", "Assassin's Creed Unity"),
    ("2688", "Watch Dogs 2"),
    ("3539", "Assassin's Creed Origins"),
    ("4311", "Far Cry 5"),
    ("4932", "Tom Clancy's The Division 2"),
    ("5059", "Assassin's Creed Odyssey"),
    ("13504", "Assassin's Creed Valhalla"),
];

pub struct UbisoftProbe {
    ctx: ProbeContext,
}

impl UbisoftProbe {
    pub fn new(ctx: ProbeContext) -> Self {
        Self { ctx }
    }

    fn system(&self) -> &dyn SystemAccess {
        self.ctx.system.as_ref()
    }

    /// Title lookup chain: uninstall entry, known table, launcher cache, folder
    fn title_for(&self, id: &str, install_dir: &Path, configurations: Option<&str>) -> String {
        helpers::uninstall_entry(self.system(), &format!("Uplay Install {}", id))
            .and_then(|entry| entry.display_name)
            .or_else(|| {
                KNOWN_TITLES
                    .iter()
                    .find(|(known, _)| *known == id)
                    .map(|(_, title)| title.to_string())
            })
            .or_else(|| {
                configurations.and_then(|text| title_from_configurations(text, install_dir))
            })
            .map(|title| helpers::clean_title(&title))
            .unwrap_or_else(|| helpers::folder_title(install_dir))
    }

    fn game_for_id(
        &self,
        id: &str,
        configurations: Option<&str>,
    ) -> Result<DetectedGame, ProbeIssue> {
        let key = format!(r"{}\{}", INSTALLS_KEY, id);
        let raw_dir = helpers::read_registry_value(self.system(), &key, "InstallDir")
            .ok_or_else(|| ProbeIssue::parse(format!("install {}", id), "missing InstallDir"))?;
        let install_dir = PathBuf::from(raw_dir.trim_end_matches(['/', '\\']));

        let title = self.title_for(id, &install_dir, configurations);
        let executable = helpers::validate_install(self.system(), &install_dir, &title)?;

        Ok(DetectedGame::new(title)
            .with_external_id(id)
            .with_install_path(install_dir)
            .with_icon_hint(executable.clone())
            .with_executable(executable)
            .with_launch_command(format!("uplay://launch/{}/0", id)))
    }
}

impl LauncherProbe for UbisoftProbe {
    fn launcher(&self) -> LauncherKind {
        LauncherKind::UbisoftConnect
    }

    fn resolve_install_path(&self) -> Option<InstallLocation> {
        helpers::locate_install_dir(self.system(), REGISTRY, DEFAULTS).map(InstallLocation::Path)
    }

    fn detect_games(&self) -> DetectionResult {
        let Some(location) = self.resolve_install_path() else {
            return not_installed(self.launcher());
        };

        // Binary file; only its readable fragments are used
        let configurations = location.as_path().and_then(|dir| {
            self.system()
                .read_bytes(&helpers::join_relative(dir, CONFIGURATIONS))
                .ok()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        });

        let mut games = Vec::new();
        let mut issues = Vec::new();
        for (_, _, id) in helpers::registry_subkeys_all(self.system(), INSTALLS_KEY) {
            if !id.chars().all(|c| c.is_ascii_digit()) {
                issues.push(ProbeIssue::parse(&id, "install key is not a product id"));
                continue;
            }
            match self.game_for_id(&id, configurations.as_deref()) {
                Ok(game) => games.push(game),
                Err(issue) => issues.push(issue),
            }
        }

        finish(self.launcher(), location, games, issues)
    }
}

/// Best-effort title from the launcher's configuration cache.
///
/// The cache is a sequence of YAML documents, one per product, each starting
/// with a `version:` line. The document mentioning the install folder name is
/// taken, and its first literal `name:` value used. Localisation placeholders
/// such as `l1` or `NAME` are ignored.
fn title_from_configurations(text: &str, install_dir: &Path) -> Option<String> {
    let folder = file_name_of(&install_dir.to_string_lossy()).to_lowercase();
    if folder.is_empty() {
        return None;
    }

    text.split("version: ")
        .filter(|document| document.to_lowercase().contains(&folder))
        .find_map(|document| {
            document.lines().find_map(|line| {
                let value = line.trim().strip_prefix("name:")?;
                let value = value.trim().trim_matches(['"', '\'']).trim();
                let placeholder = value.eq_ignore_ascii_case("name")
                    || (value.starts_with('l') && value[1..].chars().all(|c| c.is_ascii_digit()));
                (!value.is_empty() && !placeholder).then(|| value.to_string())
            })
        })
}
