//! Integration tests for launcher detection

use gamevault_detect::helpers;
use gamevault_detect::{LauncherKind, ProbeContext, ProbeRegistry};
use gamevault_platform::mock::MemorySystem;
use gamevault_platform::{Hive, OsSystem, RegistryView};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Real directory tree for helper tests
struct DetectTestEnv {
    #[allow(dead_code)]
    temp_dir: TempDir,
    games_dir: PathBuf,
}

impl DetectTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let games_dir = temp_dir.path().join("games");
        fs::create_dir_all(&games_dir).unwrap();

        Self { temp_dir, games_dir }
    }

    fn create_file(&self, relative: &str, size: usize) -> PathBuf {
        let path = self.games_dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, vec![0u8; size]).unwrap();
        path
    }
}

fn machine_with_three_launchers() -> MemorySystem {
    MemorySystem::windows_layout()
        // Steam with one game
        .with_registry_value(
            Hive::LocalMachine,
            RegistryView::Registry32,
            r"SOFTWARE\Valve\Steam",
            "InstallPath",
            r"C:\Program Files (x86)\Steam",
        )
        .with_file(
            r"C:\Program Files (x86)\Steam\steamapps\appmanifest_620.acf",
            "\"AppState\" { \"appid\" \"620\" \"name\" \"Portal 2\" \"StateFlags\" \"4\" \"installdir\" \"Portal 2\" }",
        )
        .with_file(r"C:\Program Files (x86)\Steam\steamapps\common\Portal 2\portal2.exe", "MZ")
        // Rockstar launcher with no games
        .with_file(r"C:\Program Files\Rockstar Games\Launcher\Launcher.exe", "MZ")
        // Roblox player
        .with_file(
            r"C:\Users\player\AppData\Local\Roblox\Versions\version-1\RobloxPlayerBeta.exe",
            "MZ",
        )
}

#[test]
fn test_registry_detects_installed_launchers() {
    let mut ctx = ProbeContext::new(Arc::new(machine_with_three_launchers()));
    ctx.settings.drive_scan = false;
    let registry = ProbeRegistry::with_default_probes(ctx);

    let installed: Vec<LauncherKind> = registry
        .detect_installed()
        .into_iter()
        .filter(|(_, installed)| *installed)
        .map(|(kind, _)| kind)
        .collect();

    assert_eq!(
        installed,
        vec![LauncherKind::Steam, LauncherKind::RockstarGames, LauncherKind::Roblox]
    );
}

#[test]
fn test_every_probe_returns_a_result() {
    let mut ctx = ProbeContext::new(Arc::new(machine_with_three_launchers()));
    ctx.settings.drive_scan = false;
    let registry = ProbeRegistry::with_default_probes(ctx);

    for probe in registry.iter() {
        let result = probe.detect_games();
        assert_eq!(result.launcher, probe.launcher());
        assert_eq!(result.installed, probe.probe_installed());
        if !result.installed {
            assert!(result.games.is_empty());
        }
        for game in &result.games {
            assert!(!game.name.is_empty());
        }
    }

    let steam = registry.get(LauncherKind::Steam).unwrap().detect_games();
    assert_eq!(steam.games.len(), 1);
    assert_eq!(steam.games[0].name, "Portal 2");

    let rockstar = registry.get(LauncherKind::RockstarGames).unwrap().detect_games();
    assert!(rockstar.installed);
    assert!(rockstar.games.is_empty());
}

#[test]
fn test_validity_gate_on_real_directories() {
    let env = DetectTestEnv::new();
    env.create_file("Alpha/Alpha.exe", 2048);
    env.create_file("Alpha/unins000.exe", 8192);
    env.create_file("Alpha/bin/AlphaServer.exe", 512);
    env.create_file("Broken/UnityCrashHandler64.exe", 4096);
    env.create_file("Broken/readme.txt", 16);

    let system = OsSystem::new();
    let alpha = env.games_dir.join("Alpha");
    let candidates = helpers::find_game_executables(&system, &alpha);

    assert_eq!(candidates.len(), 2);
    assert!(candidates.iter().all(|c| !helpers::is_utility_executable(&c.name)));
    assert_eq!(
        helpers::select_main_executable(&candidates, "Alpha"),
        Some(alpha.join("Alpha.exe"))
    );

    assert!(helpers::is_valid_install(&system, &alpha));
    assert!(!helpers::is_valid_install(&system, &env.games_dir.join("Broken")));
    assert!(!helpers::is_valid_install(&system, &env.games_dir.join("Missing")));
}

#[test]
fn test_heuristic_scan_on_real_directories() {
    let env = DetectTestEnv::new();
    env.create_file("Blizzard/Hearthstone/.build.info", 10);
    env.create_file("Blizzard/Hearthstone/Hearthstone.exe", 10);
    env.create_file("Blizzard/_CommonRedist/Fake/.build.info", 10);
    env.create_file("Blizzard/_CommonRedist/Fake/Fake.exe", 10);

    let system = OsSystem::new();
    let budget = gamevault_platform::ScanBudget::new(3);
    let walk = helpers::heuristic_scan(&system, &[env.games_dir.clone()], &[".build.info"], &budget);

    assert!(walk.complete);
    assert_eq!(walk.dirs, vec![env.games_dir.join("Blizzard").join("Hearthstone")]);
}
