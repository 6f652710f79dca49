//! Riot Client: product settings YAML under the shared metadata folder

use super::{data_missing, finish, not_installed, quoted};
use crate::helpers;
use crate::{DetectedGame, DetectionResult, InstallLocation, LauncherKind, LauncherProbe, ProbeContext, ProbeIssue};
use gamevault_platform::{KnownFolder, SystemAccess, file_name_of};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CLIENT_INSTALLS: &str = "Riot Games/RiotClientInstalls.json";

const METADATA_DIR: &str = "Riot Games/Metadata";

const CLIENT_EXE: &str = "RiotClientServices.exe";

const DEFAULT_CLIENT_DIR: &str = "Riot Games/Riot Client";

/// Product id and display title
const KNOWN_TITLES: &[(&str, &str)] = &[
    ("league_of_legends", "League of Legends"),
    ("valorant", "VALORANT"),
    ("bacon", "Legends of Runeterra"),
    ("lion", "2XKO"),
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClientInstalls {
    rc_default: Option<String>,
    rc_live: Option<String>,
}

pub struct RiotProbe {
    ctx: ProbeContext,
}

impl RiotProbe {
    pub fn new(ctx: ProbeContext) -> Self {
        Self { ctx }
    }

    fn system(&self) -> &dyn SystemAccess {
        self.ctx.system.as_ref()
    }

    /// `RiotClientServices.exe` as recorded by the client, if it still exists
    fn recorded_client(&self) -> Option<PathBuf> {
        let system = self.system();
        let path = helpers::join_relative(&system.known_folder(KnownFolder::ProgramData)?, CLIENT_INSTALLS);
        let text = system.read_to_string(&path).ok()?;
        let installs: ClientInstalls = match serde_json::from_str(&text) {
            Ok(installs) => installs,
            Err(e) => {
                tracing::debug!("Unreadable RiotClientInstalls.json: {}", e);
                return None;
            }
        };

        [installs.rc_default, installs.rc_live]
            .into_iter()
            .flatten()
            .map(PathBuf::from)
            .find(|exe| system.is_file(exe))
    }

    fn client_exe(&self) -> Option<PathBuf> {
        let system = self.system();
        self.recorded_client().or_else(|| {
            system
                .fixed_drives()
                .into_iter()
                .map(|drive| helpers::join_relative(&drive, DEFAULT_CLIENT_DIR).join(CLIENT_EXE))
                .find(|exe| system.is_file(exe))
        })
    }

    fn game_from_settings(
        &self,
        product: &str,
        patchline: &str,
        settings: &Path,
        client: &Path,
    ) -> Result<DetectedGame, ProbeIssue> {
        let file_name = file_name_of(&settings.to_string_lossy()).to_string();
        let text = self
            .system()
            .read_to_string(settings)
            .map_err(|e| ProbeIssue::parse(&file_name, e))?;
        let install_dir = yaml_value(&text, "product_install_full_path")
            .map(PathBuf::from)
            .ok_or_else(|| ProbeIssue::parse(&file_name, "missing product_install_full_path"))?;

        let title = KNOWN_TITLES
            .iter()
            .find(|(id, _)| *id == product)
            .map(|(_, title)| title.to_string())
            .unwrap_or_else(|| helpers::folder_title(&install_dir));
        let executable = helpers::validate_install(self.system(), &install_dir, &title)?;

        Ok(DetectedGame::new(title)
            .with_external_id(format!("{}.{}", product, patchline))
            .with_install_path(install_dir)
            .with_icon_hint(executable.clone())
            .with_executable(executable)
            .with_launch_command(format!(
                "{} --launch-product={} --launch-patchline={}",
                quoted(client),
                product,
                patchline
            )))
    }
}

impl LauncherProbe for RiotProbe {
    fn launcher(&self) -> LauncherKind {
        LauncherKind::RiotGames
    }

    fn resolve_install_path(&self) -> Option<InstallLocation> {
        self.client_exe()
            .and_then(|exe| helpers::parent_of(&exe))
            .map(InstallLocation::Path)
    }

    fn detect_games(&self) -> DetectionResult {
        let Some(client) = self.client_exe() else {
            return not_installed(self.launcher());
        };
        let Some(client_dir) = helpers::parent_of(&client) else {
            return not_installed(self.launcher());
        };
        let location = InstallLocation::Path(client_dir);
        let system = self.system();

        let Some(metadata) = system
            .known_folder(KnownFolder::ProgramData)
            .map(|data| helpers::join_relative(&data, METADATA_DIR))
            .filter(|dir| system.is_dir(dir))
        else {
            return data_missing(self.launcher(), location, "metadata folder");
        };

        let mut games = Vec::new();
        let mut issues = Vec::new();
        for entry in system.list_dir(&metadata).unwrap_or_default() {
            if !entry.is_dir {
                continue;
            }
            // Folders are named `<product>.<patchline>`
            let Some((product, patchline)) = entry.name.split_once('.') else {
                continue;
            };
            if product == "riot_client" {
                continue;
            }
            let Some(settings) = system.glob(&entry.path, "*.product_settings.yaml").into_iter().next() else {
                issues.push(ProbeIssue::DataUnavailable(format!("{} has no product settings", entry.name)));
                continue;
            };
            match self.game_from_settings(product, patchline, &settings, &client) {
                Ok(game) => games.push(game),
                Err(issue) => issues.push(issue),
            }
        }

        finish(self.launcher(), location, games, issues)
    }
}

/// Scalar value of a top-level `key: value` line
fn yaml_value(text: &str, key: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let rest = line.strip_prefix(key)?.trim_start().strip_prefix(':')?;
        let value = rest.trim().trim_matches(['"', '\'']).trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}
