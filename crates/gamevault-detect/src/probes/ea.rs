//! EA app: registry game keys plus `__Installer` folder heuristics

use super::{finish, heuristic_dirs, not_installed};
use crate::helpers::{self, DefaultPath, RegistryProbe};
use crate::{DetectedGame, DetectionResult, InstallLocation, LauncherKind, LauncherProbe, ProbeContext, ProbeIssue};
use gamevault_platform::{KnownFolder, SystemAccess, path_key};
use regex::Regex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::LazyLock;

const REGISTRY: &[RegistryProbe] = &[
    RegistryProbe::new(r"SOFTWARE\Electronic Arts\EA Desktop", "InstallLocation"),
    RegistryProbe::new(r"SOFTWARE\Electronic Arts\EA Desktop", "ClientPath"),
];

const DEFAULTS: &[DefaultPath] = &[
    (KnownFolder::ProgramFiles, "Electronic Arts/EA Desktop"),
    (KnownFolder::ProgramFilesX86, "Electronic Arts/EA Desktop"),
];

/// Parent keys whose subkeys are installed games
const GAME_ROOTS: &[&str] = &[r"SOFTWARE\EA Games", r"SOFTWARE\Electronic Arts"];

static CONTENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<contentID>([^<]+)</contentID>").expect("invalid content id regex"));

static TITLE_EN_US: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<gameTitle[^>]*locale="en_US"[^>]*>([^<]+)</gameTitle>"#).expect("invalid title regex")
});

static TITLE_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<gameTitle[^>]*>([^<]+)</gameTitle>").expect("invalid title regex"));

/// Subkeys under the game roots that belong to the client itself
const CLIENT_KEYS: &[&str] = &["EA Desktop", "EA Core", "EA Desktop Installer", "Origin"];

const HEURISTIC_ROOTS: &[DefaultPath] = &[
    (KnownFolder::ProgramFiles, "EA Games"),
    (KnownFolder::ProgramFilesX86, "Origin Games"),
    (KnownFolder::ProgramFiles, "Electronic Arts"),
];

const INSTALLER_DATA: &str = "__Installer/installerdata.xml";

/// A folder believed to hold an EA game
#[derive(Debug, Clone)]
struct Candidate {
    dir: PathBuf,
    registry_key: Option<String>,
    display_name: Option<String>,
}

pub struct EaProbe {
    ctx: ProbeContext,
}

impl EaProbe {
    pub fn new(ctx: ProbeContext) -> Self {
        Self { ctx }
    }

    fn system(&self) -> &dyn SystemAccess {
        self.ctx.system.as_ref()
    }

    fn registry_candidates(&self) -> Vec<Candidate> {
        let system = self.system();
        let mut found = Vec::new();

        for root in GAME_ROOTS {
            for (_, _, name) in helpers::registry_subkeys_all(system, root) {
                if CLIENT_KEYS.iter().any(|client| client.eq_ignore_ascii_case(&name)) {
                    continue;
                }
                let key = format!(r"{}\{}", root, name);
                let Some(dir) = helpers::read_registry_value(system, &key, "Install Dir") else {
                    continue;
                };
                found.push(Candidate {
                    dir: PathBuf::from(dir),
                    display_name: helpers::read_registry_value(system, &key, "DisplayName"),
                    registry_key: Some(name),
                });
            }
        }

        found
    }

    fn game_from_candidate(&self, candidate: &Candidate) -> Result<DetectedGame, ProbeIssue> {
        let installer_data = self
            .system()
            .read_to_string(&helpers::join_relative(&candidate.dir, INSTALLER_DATA))
            .ok();

        let content_id = installer_data
            .as_deref()
            .and_then(|xml| helpers::capture_first(&CONTENT_ID, xml));
        let xml_title = installer_data
            .as_deref()
            .and_then(|xml| helpers::capture_first(&TITLE_EN_US, xml).or_else(|| helpers::capture_first(&TITLE_ANY, xml)));

        let title = xml_title
            .or_else(|| candidate.display_name.clone())
            .or_else(|| candidate.registry_key.clone())
            .map(|name| helpers::clean_title(&name))
            .unwrap_or_else(|| helpers::folder_title(&candidate.dir));

        let executable = helpers::validate_install(self.system(), &candidate.dir, &title)?;

        let mut game = DetectedGame::new(title)
            .with_install_path(candidate.dir.clone())
            .with_icon_hint(executable.clone())
            .with_executable(executable);

        if let Some(id) = content_id {
            game = game
                .with_launch_command(format!("origin2://game/launch?offerIds={}", id))
                .with_external_id(id);
        } else if let Some(key) = &candidate.registry_key {
            game = game.with_external_id(key.clone());
        }

        Ok(game)
    }
}

impl LauncherProbe for EaProbe {
    fn launcher(&self) -> LauncherKind {
        LauncherKind::EAApp
    }

    fn resolve_install_path(&self) -> Option<InstallLocation> {
        helpers::locate_install_dir(self.system(), REGISTRY, DEFAULTS).map(InstallLocation::Path)
    }

    fn detect_games(&self) -> DetectionResult {
        let Some(location) = self.resolve_install_path() else {
            return not_installed(self.launcher());
        };

        let mut seen = HashSet::new();
        let mut candidates: Vec<Candidate> = self
            .registry_candidates()
            .into_iter()
            .filter(|candidate| seen.insert(path_key(&candidate.dir)))
            .collect();

        let walk = heuristic_dirs(&self.ctx, HEURISTIC_ROOTS, &[INSTALLER_DATA]);
        for dir in walk.dirs {
            if seen.insert(path_key(&dir)) {
                candidates.push(Candidate {
                    dir,
                    registry_key: None,
                    display_name: None,
                });
            }
        }

        let mut games = Vec::new();
        let mut issues = Vec::new();
        let mut seen_ids = HashSet::new();
        for candidate in &candidates {
            match self.game_from_candidate(candidate) {
                Ok(game) => {
                    let fresh = game
                        .join_key()
                        .is_none_or(|id| seen_ids.insert(id.to_lowercase()));
                    if fresh {
                        games.push(game);
                    }
                }
                Err(issue) => issues.push(issue),
            }
        }

        let result = finish(self.launcher(), location, games, issues);
        if walk.complete {
            result
        } else {
            result.partial("heuristic scan stopped early")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamevault_platform::mock::MemorySystem;
    use gamevault_platform::{Hive, RegistryView};
    use std::sync::Arc;

    const INSTALLER_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<DiPManifest version="4.0">
  <gameTitles>
    <gameTitle locale="de_DE">Schlachtfeld</gameTitle>
    <gameTitle locale="en_US">Battlefield™ 2042</gameTitle>
  </gameTitles>
  <contentIDs>
    <contentID>1010268</contentID>
    <contentID>1010269</contentID>
  </contentIDs>
</DiPManifest>"#;

    fn ea_machine() -> MemorySystem {
        MemorySystem::windows_layout()
            .with_registry_value(
                Hive::LocalMachine,
                RegistryView::Registry64,
                r"SOFTWARE\Electronic Arts\EA Desktop",
                "ClientPath",
                r"C:\Program Files\Electronic Arts\EA Desktop\EA Desktop\EADesktop.exe",
            )
            .with_file(
                r"C:\Program Files\Electronic Arts\EA Desktop\EA Desktop\EADesktop.exe",
                "MZ",
            )
    }

    fn probe(system: MemorySystem) -> EaProbe {
        let ctx = ProbeContext::new(Arc::new(system));
        EaProbe::new(ctx)
    }

    fn apex_machine() -> MemorySystem {
        ea_machine()
            .with_file(r"C:\Program Files\EA Games\Apex Legends\r5apex.exe", "MZ")
            .with_file(
                r"C:\Program Files\EA Games\Apex Legends\__Installer\installerdata.xml",
                INSTALLER_XML,
            )
    }

    #[test]
    fn test_heuristic_game_and_cut_short_walk() {
        let settings = crate::DetectSettings {
            drive_scan: false,
            ..crate::DetectSettings::default()
        };
        let ctx = ProbeContext::new(Arc::new(apex_machine())).with_settings(settings.clone());
        let result = EaProbe::new(ctx).detect_games();
        assert!(result.complete);
        assert_eq!(result.games.len(), 1);

        settings.cancel.cancel();
        let ctx = ProbeContext::new(Arc::new(apex_machine())).with_settings(settings);
        let result = EaProbe::new(ctx).detect_games();
        assert!(result.installed);
        assert!(result.games.is_empty());
        assert!(!result.complete);
        assert_eq!(result.diagnostic.as_deref(), Some("heuristic scan stopped early"));
    }

    #[test]
    fn test_registry_game_with_installer_data() {
        let system = ea_machine()
            .with_registry_value(
                Hive::LocalMachine,
                RegistryView::Registry32,
                r"SOFTWARE\EA Games\Battlefield 2042",
                "Install Dir",
                r"D:\EA\Battlefield 2042\",
            )
            .with_file(r"D:\EA\Battlefield 2042\BF2042.exe", "MZ")
            .with_file(r"D:\EA\Battlefield 2042\__Installer\installerdata.xml", INSTALLER_XML);

        let result = probe(system).detect_games();
        assert!(result.installed);
        assert_eq!(result.games.len(), 1);

        let game = &result.games[0];
        assert_eq!(game.name, "Battlefield 2042");
        assert_eq!(game.external_id.as_deref(), Some("1010268"));
        assert_eq!(
            game.launch_command.as_deref(),
            Some("origin2://game/launch?offerIds=1010268")
        );
    }

    #[test]
    fn test_registry_game_without_installer_data_uses_key() {
        let system = ea_machine()
            .with_registry_value(
                Hive::LocalMachine,
                RegistryView::Registry32,
                r"SOFTWARE\EA Games\The Sims 4",
                "Install Dir",
                r"C:\Program Files (x86)\Origin Games\The Sims 4",
            )
            .with_file(r"C:\Program Files (x86)\Origin Games\The Sims 4\Game\Bin\TS4_x64.exe", "MZ");

        let result = probe(system).detect_games();
        assert_eq!(result.games.len(), 1);
        assert_eq!(result.games[0].external_id.as_deref(), Some("The Sims 4"));
        assert!(result.games[0].launch_command.is_none());
    }

    #[test]
    fn test_heuristic_finds_unregistered_install() {
        let system = ea_machine()
            .with_file(r"C:\Program Files\EA Games\Apex\__Installer\installerdata.xml", "<x><contentID>Origin.OFR.50.0002694</contentID></x>")
            .with_file(r"C:\Program Files\EA Games\Apex\r5apex.exe", "MZ")
            .with_file(r"C:\Program Files\EA Games\Junk\__Installer\installerdata.xml", "<x/>")
            .with_file(r"C:\Program Files\EA Games\Junk\Cleanup.exe", "MZ");

        let mut ctx = ProbeContext::new(Arc::new(system));
        ctx.settings.drive_scan = false;
        let result = EaProbe::new(ctx).detect_games();

        assert_eq!(result.games.len(), 1);
        assert_eq!(result.games[0].name, "Apex");
        assert_eq!(result.games[0].external_id.as_deref(), Some("Origin.OFR.50.0002694"));
    }

    #[test]
    fn test_client_keys_are_not_games() {
        let system = ea_machine().with_registry_value(
            Hive::LocalMachine,
            RegistryView::Registry64,
            r"SOFTWARE\Electronic Arts\EA Desktop",
            "Install Dir",
            r"C:\Program Files\Electronic Arts\EA Desktop",
        );
        let result = probe(system).detect_games();
        assert!(result.games.is_empty());
        assert!(result.issues.is_empty());
    }
}
