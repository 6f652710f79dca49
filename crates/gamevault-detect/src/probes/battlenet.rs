//! Battle.net: known product codes located through several weak signals

use super::{finish, heuristic_dirs, not_installed};
use crate::helpers::{self, DefaultPath, RegistryProbe};
use crate::{DetectedGame, DetectionResult, InstallLocation, LauncherKind, LauncherProbe, ProbeContext};
use gamevault_platform::{KnownFolder, SystemAccess, file_name_of};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

const REGISTRY: &[RegistryProbe] = &[RegistryProbe::new(
    r"SOFTWARE\Blizzard Entertainment\Battle.net\Capabilities",
    "ApplicationIcon",
)];

const DEFAULTS: &[DefaultPath] = &[
    (KnownFolder::ProgramFilesX86, "Battle.net"),
    (KnownFolder::ProgramFiles, "Battle.net"),
];

const PRODUCT_DB: &str = "Battle.net/Agent/product.db";

const HEURISTIC_ROOTS: &[DefaultPath] = &[(KnownFolder::ProgramFilesX86, ""), (KnownFolder::ProgramFiles, "")];

/// Product code, display title, default install folder name
const KNOWN_TITLES: &[(&str, &str, &str)] = &[
    ("wow", "World of Warcraft", "World of Warcraft"),
    ("pro", "Overwatch 2", "Overwatch"),
    ("fen", "Diablo IV", "Diablo IV"),
    ("s2", "StarCraft II", "StarCraft II"),
    ("hs_beta", "Hearthstone", "Hearthstone"),
    ("w3", "Warcraft III: Reforged", "Warcraft III"),
    ("osi", "Diablo II: Resurrected", "Diablo II Resurrected"),
    ("d3", "Diablo III", "Diablo III"),
    ("hero", "Heroes of the Storm", "Heroes of the Storm"),
    ("s1", "StarCraft: Remastered", "StarCraft"),
    ("odin", "Call of Duty: Modern Warfare", "Call of Duty Modern Warfare"),
    ("viper", "Call of Duty: Black Ops 4", "Call of Duty Black Ops 4"),
    ("zeus", "Call of Duty: Black Ops Cold War", "Call of Duty Black Ops Cold War"),
    ("fore", "Call of Duty: Vanguard", "Call of Duty Vanguard"),
    ("auks", "Call of Duty", "Call of Duty"),
    ("lazr", "Call of Duty: Modern Warfare 2 Campaign Remastered", "Call of Duty Modern Warfare 2 Campaign Remastered"),
    ("wlby", "Crash Bandicoot 4: It's About Time", "Crash Bandicoot 4"),
    ("anbs", "Diablo Immortal", "Diablo Immortal"),
    ("rtro", "Blizzard Arcade Collection", "Blizzard Arcade Collection"),
];

/// Per-title matcher for absolute install paths ending in the title's folder
static PRODUCT_DB_PATHS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    KNOWN_TITLES
        .iter()
        .map(|(code, _, folder)| {
            let pattern = format!(
                r#"(?i)([a-z]:[\\/](?:[^\x00-\x1f"<>|?*\\/]+[\\/])*?{})"#,
                regex::escape(folder)
            );
            (*code, Regex::new(&pattern).expect("invalid product.db path regex"))
        })
        .collect()
});

pub struct BattleNetProbe {
    ctx: ProbeContext,
}

impl BattleNetProbe {
    pub fn new(ctx: ProbeContext) -> Self {
        Self { ctx }
    }

    fn system(&self) -> &dyn SystemAccess {
        self.ctx.system.as_ref()
    }

    /// Signal 1: uninstall entries named after a known title
    fn from_uninstall(&self, found: &mut BTreeMap<&'static str, PathBuf>) {
        let system = self.system();
        for entry in helpers::uninstall_entries(system) {
            let (Some(name), Some(location)) = (entry.display_name, entry.install_location) else {
                continue;
            };
            let Some((code, _, _)) = KNOWN_TITLES
                .iter()
                .find(|(_, title, folder)| name.eq_ignore_ascii_case(title) || name.eq_ignore_ascii_case(folder))
            else {
                continue;
            };
            if let Some(dir) = helpers::existing_dir(system, &location) {
                found.entry(*code).or_insert(dir);
            }
        }
    }

    /// Signal 2: install paths embedded in the agent's protobuf database
    fn from_product_db(&self, found: &mut BTreeMap<&'static str, PathBuf>) {
        let system = self.system();
        let Some(path) = system
            .known_folder(KnownFolder::ProgramData)
            .map(|data| helpers::join_relative(&data, PRODUCT_DB))
        else {
            return;
        };
        let Ok(bytes) = system.read_bytes(&path) else {
            return;
        };
        let text = String::from_utf8_lossy(&bytes);

        for (code, regex) in PRODUCT_DB_PATHS.iter() {
            if found.contains_key(code) {
                continue;
            }
            let dir = regex
                .captures_iter(&text)
                .filter_map(|caps| caps.get(1))
                .map(|m| PathBuf::from(m.as_str()))
                .find(|dir| system.is_dir(dir));
            if let Some(dir) = dir {
                found.insert(*code, dir);
            }
        }
    }

    /// Signal 3: folders holding a `.build.info` marker; false when the walk was cut short
    fn from_heuristic(&self, found: &mut BTreeMap<&'static str, PathBuf>) -> bool {
        if KNOWN_TITLES.iter().all(|(code, _, _)| found.contains_key(code)) {
            return true;
        }
        let walk = heuristic_dirs(&self.ctx, HEURISTIC_ROOTS, &[".build.info"]);
        for dir in walk.dirs {
            let name = file_name_of(&dir.to_string_lossy()).to_string();
            if let Some((code, _, _)) = KNOWN_TITLES
                .iter()
                .find(|(_, title, folder)| name.eq_ignore_ascii_case(folder) || name.eq_ignore_ascii_case(title))
            {
                found.entry(*code).or_insert(dir);
            }
        }
        walk.complete
    }
}

impl LauncherProbe for BattleNetProbe {
    fn launcher(&self) -> LauncherKind {
        LauncherKind::BattleNet
    }

    fn resolve_install_path(&self) -> Option<InstallLocation> {
        let system = self.system();
        helpers::locate_install_dir(system, REGISTRY, &[])
            .or_else(|| {
                helpers::uninstall_entry(system, "Battle.net")
                    .and_then(|entry| entry.install_location)
                    .and_then(|location| helpers::existing_dir(system, &location))
            })
            .or_else(|| helpers::first_existing_default(system, DEFAULTS))
            .map(InstallLocation::Path)
    }

    fn detect_games(&self) -> DetectionResult {
        let Some(location) = self.resolve_install_path() else {
            return not_installed(self.launcher());
        };

        let mut issues = Vec::new();
        let mut found = BTreeMap::new();
        self.from_uninstall(&mut found);
        self.from_product_db(&mut found);
        let complete = self.from_heuristic(&mut found);

        let mut games = Vec::new();
        for (code, title, _) in KNOWN_TITLES {
            let Some(dir) = found.get(code) else {
                continue;
            };
            match helpers::validate_install(self.system(), dir, title) {
                Ok(executable) => games.push(
                    DetectedGame::new(*title)
                        .with_external_id(*code)
                        .with_install_path(dir.clone())
                        .with_icon_hint(executable.clone())
                        .with_executable(executable)
                        .with_launch_command(format!("battlenet://{}", code)),
                ),
                Err(issue) => issues.push(issue),
            }
        }

        let result = finish(self.launcher(), location, games, issues);
        if complete {
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

    fn battlenet_machine() -> MemorySystem {
        MemorySystem::windows_layout()
            .with_registry_value(
                Hive::LocalMachine,
                RegistryView::Registry32,
                r"SOFTWARE\Blizzard Entertainment\Battle.net\Capabilities",
                "ApplicationIcon",
                r#""C:\Program Files (x86)\Battle.net\Battle.net Launcher.exe",0"#,
            )
            .with_file(r"C:\Program Files (x86)\Battle.net\Battle.net Launcher.exe", "MZ")
    }

    fn probe(system: MemorySystem) -> BattleNetProbe {
        let mut ctx = ProbeContext::new(Arc::new(system));
        ctx.settings.drive_scan = false;
        BattleNetProbe::new(ctx)
    }

    #[test]
    fn test_uninstall_entry_signal() {
        let system = battlenet_machine()
            .with_registry_value(
                Hive::LocalMachine,
                RegistryView::Registry32,
                r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\Overwatch",
                "DisplayName",
                "Overwatch",
            )
            .with_registry_value(
                Hive::LocalMachine,
                RegistryView::Registry32,
                r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\Overwatch",
                "InstallLocation",
                r"D:\Games\Overwatch",
            )
            .with_file(r"D:\Games\Overwatch\_retail_\Overwatch.exe", "MZ");

        let result = probe(system).detect_games();
        assert_eq!(result.games.len(), 1);
        assert_eq!(result.games[0].name, "Overwatch 2");
        assert_eq!(result.games[0].launch_command.as_deref(), Some("battlenet://pro"));
    }

    #[test]
    fn test_product_db_signal() {
        let mut db = vec![0x0a, 0x03];
        db.extend_from_slice(b"wow");
        db.extend_from_slice(&[0x12, 0x20]);
        db.extend_from_slice(b"E:/Blizzard/World of Warcraft");
        db.extend_from_slice(&[0x1a, 0x05]);
        db.extend_from_slice(b"enUS");

        let system = battlenet_machine()
            .with_file(r"C:\ProgramData\Battle.net\Agent\product.db", db)
            .with_file(r"E:\Blizzard\World of Warcraft\_retail_\Wow.exe", "MZ");

        let result = probe(system).detect_games();
        assert_eq!(result.games.len(), 1);
        assert_eq!(result.games[0].external_id.as_deref(), Some("wow"));
    }

    #[test]
    fn test_product_db_matchers_cover_every_title() {
        assert_eq!(PRODUCT_DB_PATHS.len(), KNOWN_TITLES.len());

        let (_, overwatch) = PRODUCT_DB_PATHS.iter().find(|(code, _)| *code == "pro").unwrap();
        let caps = overwatch.captures("\x12\x1dD:\\Games\\Overwatch\x1a").unwrap();
        assert_eq!(&caps[1], r"D:\Games\Overwatch");
    }

    #[test]
    fn test_build_info_heuristic_signal() {
        let system = battlenet_machine()
            .with_file(r"C:\Program Files (x86)\Diablo IV\.build.info", "Branch!STRING:0")
            .with_file(r"C:\Program Files (x86)\Diablo IV\Diablo IV.exe", "MZ")
            .with_file(r"C:\Program Files (x86)\Unknown Game\.build.info", "")
            .with_file(r"C:\Program Files (x86)\Unknown Game\Unknown.exe", "MZ");

        let result = probe(system).detect_games();
        assert_eq!(result.games.len(), 1);
        assert_eq!(result.games[0].external_id.as_deref(), Some("fen"));
    }

    #[test]
    fn test_known_folder_without_executable_is_rejected() {
        let system = battlenet_machine()
            .with_registry_value(
                Hive::LocalMachine,
                RegistryView::Registry32,
                r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\Hearthstone",
                "DisplayName",
                "Hearthstone",
            )
            .with_registry_value(
                Hive::LocalMachine,
                RegistryView::Registry32,
                r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\Hearthstone",
                "InstallLocation",
                r"D:\Hearthstone",
            )
            .with_file(r"D:\Hearthstone\Hearthstone Beta Launcher.exe.bak", "");

        let result = probe(system).detect_games();
        assert!(result.games.is_empty());
        assert_eq!(result.issues.len(), 1);
    }
}
