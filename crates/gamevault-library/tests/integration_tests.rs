//! Integration tests for scanning, reconciliation and launching

use chrono::Utc;
use gamevault_config::GameVaultConfig;
use gamevault_detect::{DetectedGame, DetectionResult, InstallLocation, LauncherProbe, ProbeRegistry};
use gamevault_launch::mock::{RecordingSpawner, SpawnRecord};
use gamevault_launch::{LaunchPolicy, LaunchResolver};
use gamevault_library::{
    GameLibrary, GameRecord, LaunchOutcome, LauncherKind, LibraryError, LibraryRepository, RecordingIconSink,
    SqliteRepository,
};
use gamevault_platform::mock::MemorySystem;
use gamevault_platform::{Hive, RegistryView};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Probe whose output the test controls; `None` means not installed
#[derive(Clone)]
struct FakeProbe {
    kind: LauncherKind,
    games: Arc<Mutex<Option<Vec<DetectedGame>>>>,
    partial: Arc<AtomicBool>,
}

impl FakeProbe {
    fn new(kind: LauncherKind) -> Self {
        Self {
            kind,
            games: Arc::new(Mutex::new(None)),
            partial: Arc::new(AtomicBool::new(false)),
        }
    }

    fn report(&self, games: Vec<DetectedGame>) {
        *self.games.lock().unwrap() = Some(games);
        self.partial.store(false, Ordering::SeqCst);
    }

    /// Report `games` as all that could be read before the probe gave up
    fn report_partial(&self, games: Vec<DetectedGame>) {
        *self.games.lock().unwrap() = Some(games);
        self.partial.store(true, Ordering::SeqCst);
    }

    fn uninstall(&self) {
        *self.games.lock().unwrap() = None;
    }
}

impl LauncherProbe for FakeProbe {
    fn launcher(&self) -> LauncherKind {
        self.kind
    }

    fn resolve_install_path(&self) -> Option<InstallLocation> {
        self.games
            .lock()
            .unwrap()
            .as_ref()
            .map(|_| InstallLocation::Path(PathBuf::from(format!(r"C:\Launchers\{}", self.kind.key()))))
    }

    fn detect_games(&self) -> DetectionResult {
        match self.games.lock().unwrap().clone() {
            Some(games) => {
                let result = DetectionResult::installed(
                    self.kind,
                    InstallLocation::Path(PathBuf::from(format!(r"C:\Launchers\{}", self.kind.key()))),
                    games,
                    Vec::new(),
                );
                if self.partial.load(Ordering::SeqCst) {
                    result.partial("walk cut short")
                } else {
                    result
                }
            }
            None => DetectionResult::not_installed(self.kind, "not found"),
        }
    }
}

struct PanickingProbe;

impl LauncherProbe for PanickingProbe {
    fn launcher(&self) -> LauncherKind {
        LauncherKind::UbisoftConnect
    }

    fn resolve_install_path(&self) -> Option<InstallLocation> {
        panic!("registry exploded");
    }

    fn detect_games(&self) -> DetectionResult {
        panic!("registry exploded");
    }
}

struct LibraryTestEnv {
    #[allow(dead_code)]
    temp_dir: TempDir,
    db_path: PathBuf,
    spawner: RecordingSpawner,
    icons: RecordingIconSink,
    steam: FakeProbe,
    ea: FakeProbe,
}

impl LibraryTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("data").join("library.db");

        Self {
            temp_dir,
            db_path,
            spawner: RecordingSpawner::new(),
            icons: RecordingIconSink::new(),
            steam: FakeProbe::new(LauncherKind::Steam),
            ea: FakeProbe::new(LauncherKind::EAApp),
        }
    }

    fn system() -> MemorySystem {
        MemorySystem::windows_layout()
            .with_file(r"C:\G\Alpha.exe", "MZ")
            .with_file(r"C:\G\Shared.exe", "MZ")
    }

    fn library(&self) -> GameLibrary {
        self.library_with(ProbeRegistry::empty())
    }

    fn library_with(&self, mut probes: ProbeRegistry) -> GameLibrary {
        probes.register(Box::new(self.steam.clone()));
        probes.register(Box::new(self.ea.clone()));

        let repository = Arc::new(SqliteRepository::open(&self.db_path).unwrap());
        let resolver = LaunchResolver::new(
            Arc::new(Self::system()),
            Arc::new(self.spawner.clone()),
            LaunchPolicy::new(),
        );
        GameLibrary::new(repository, probes, resolver).with_icon_sink(Arc::new(self.icons.clone()))
    }
}

fn alpha() -> DetectedGame {
    DetectedGame::new("Alpha")
        .with_external_id("42")
        .with_install_path(r"C:\G")
        .with_executable(r"C:\G\Alpha.exe")
}

fn shared(id: &str) -> DetectedGame {
    DetectedGame::new("Shared")
        .with_external_id(id)
        .with_install_path(r"C:\G")
        .with_executable(r"C:\G\Shared.exe")
}

#[test]
fn test_first_scan_inserts_detected_game() {
    let env = LibraryTestEnv::new();
    env.steam.report(vec![alpha()]);
    let library = env.library();

    let before = Utc::now();
    let scan = library.scan_launcher(LauncherKind::Steam).unwrap();
    let after = Utc::now();

    assert_eq!(scan.inserted, 1);
    let games = library.list_all().unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].external_id.as_deref(), Some("42"));
    assert!(games[0].date_added >= before && games[0].date_added <= after);

    let state = library
        .launcher_states()
        .unwrap()
        .into_iter()
        .find(|s| s.launcher == LauncherKind::Steam)
        .unwrap();
    assert!(state.installed);
    assert!(state.last_scan.is_some());
    assert_eq!(state.install_path.as_deref(), Some(r"C:\Launchers\steam"));

    assert_eq!(env.icons.requests(), vec![(games[0].id, r"C:\G\Alpha.exe".to_string())]);
}

#[test]
fn test_rescan_with_same_output_changes_nothing() {
    let env = LibraryTestEnv::new();
    env.steam.report(vec![alpha(), DetectedGame::new("Loose").with_executable(r"C:\G\Loose.exe")]);
    let library = env.library();

    library.scan_launcher(LauncherKind::Steam).unwrap();
    let first: Vec<GameRecord> = library.list_all().unwrap();

    let scan = library.scan_launcher(LauncherKind::Steam).unwrap();
    assert_eq!((scan.inserted, scan.updated, scan.removed), (0, 0, 0));
    assert_eq!(library.list_all().unwrap(), first);
}

#[test]
fn test_missing_game_is_pruned_and_manual_game_kept() {
    let env = LibraryTestEnv::new();
    env.steam.report(vec![alpha()]);
    let library = env.library();

    let manual = library
        .add_manual_game("Homebrew", Path::new(r"D:\Homebrew\homebrew.exe"), None)
        .unwrap();
    library.scan_launcher(LauncherKind::Steam).unwrap();

    env.steam.report(Vec::new());
    let scan = library.scan_launcher(LauncherKind::Steam).unwrap();
    assert_eq!(scan.removed, 1);

    let games = library.list_all().unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0], manual);
}

#[test]
fn test_partial_scan_keeps_unseen_games() {
    let env = LibraryTestEnv::new();
    env.steam.report(vec![alpha(), shared("7")]);
    let library = env.library();
    library.scan_launcher(LauncherKind::Steam).unwrap();

    env.steam.report_partial(vec![alpha().with_launch_command("steam://rungameid/42")]);
    let scan = library.scan_launcher(LauncherKind::Steam).unwrap();

    assert_eq!((scan.updated, scan.removed), (1, 0));
    assert_eq!(scan.diagnostic.as_deref(), Some("walk cut short"));
    assert_eq!(library.list_all().unwrap().len(), 2);

    // A later full scan may prune again
    env.steam.report(vec![alpha().with_launch_command("steam://rungameid/42")]);
    assert_eq!(library.scan_launcher(LauncherKind::Steam).unwrap().removed, 1);
}

#[test]
fn test_timed_out_heuristic_walk_keeps_ea_games() {
    let env = LibraryTestEnv::new();
    let machine = || {
        MemorySystem::windows_layout()
            .with_registry_value(
                Hive::LocalMachine,
                RegistryView::Registry64,
                r"SOFTWARE\Electronic Arts\EA Desktop",
                "ClientPath",
                r"C:\Program Files\Electronic Arts\EA Desktop\EA Desktop\EADesktop.exe",
            )
            .with_file(r"C:\Program Files\Electronic Arts\EA Desktop\EA Desktop\EADesktop.exe", "MZ")
            .with_file(
                r"C:\Program Files\EA Games\Apex\__Installer\installerdata.xml",
                "<x><contentID>Origin.OFR.50.0002694</contentID></x>",
            )
            .with_file(r"C:\Program Files\EA Games\Apex\r5apex.exe", "MZ")
    };

    let mut config = GameVaultConfig::default();
    config.scan.drive_scan = false;
    let repository = Arc::new(SqliteRepository::open(&env.db_path).unwrap());
    let library = GameLibrary::from_config(&config, Arc::new(machine()), repository, Arc::new(env.spawner.clone()));
    assert_eq!(library.scan_launcher(LauncherKind::EAApp).unwrap().inserted, 1);

    config.scan.drive_scan_timeout_secs = 0;
    let repository = Arc::new(SqliteRepository::open(&env.db_path).unwrap());
    let library = GameLibrary::from_config(&config, Arc::new(machine()), repository, Arc::new(env.spawner.clone()));
    let scan = library.scan_launcher(LauncherKind::EAApp).unwrap();

    assert!(scan.installed);
    assert_eq!(scan.removed, 0);
    assert!(scan.diagnostic.is_some());
    assert_eq!(library.list_all().unwrap().len(), 1);
}

#[test]
fn test_uninstalled_launcher_keeps_its_games() {
    let env = LibraryTestEnv::new();
    env.steam.report(vec![alpha()]);
    let library = env.library();
    library.scan_launcher(LauncherKind::Steam).unwrap();

    env.steam.uninstall();
    let scan = library.scan_launcher(LauncherKind::Steam).unwrap();

    assert!(!scan.installed);
    assert_eq!(library.list_all().unwrap().len(), 1);
    let state = library.repository().launcher_state(LauncherKind::Steam).unwrap().unwrap();
    assert!(!state.installed);
}

#[test]
fn test_shared_executable_keeps_priority_launcher() {
    let env = LibraryTestEnv::new();
    env.ea.report(vec![shared("Origin.OFR.50.0001")]);
    let library = env.library();
    library.scan_launcher(LauncherKind::EAApp).unwrap();

    env.steam.report(vec![shared("1238840")]);
    let report = library.scan_all();

    assert_eq!(report.duplicates_removed, 1);
    let games = library.list_all().unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].launcher, LauncherKind::Steam);

    assert_eq!(library.deduplicate().unwrap(), 0);
}

#[test]
fn test_failed_launcher_does_not_stop_the_scan() {
    let env = LibraryTestEnv::new();
    env.steam.report(vec![alpha()]);
    let mut probes = ProbeRegistry::empty();
    probes.register(Box::new(PanickingProbe));
    let library = env.library_with(probes);

    let report = library.scan_all();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, LauncherKind::UbisoftConnect);
    assert_eq!(report.scans.len(), 2);
    assert_eq!(library.list_all().unwrap().len(), 1);
    assert!(matches!(
        library.scan_launcher(LauncherKind::UbisoftConnect),
        Err(LibraryError::ProbeFailed(LauncherKind::UbisoftConnect))
    ));

    let installed = library.detect_installed_launchers();
    assert_eq!(installed.get(&LauncherKind::UbisoftConnect), Some(&false));
    assert_eq!(installed.get(&LauncherKind::Steam), Some(&true));
}

#[test]
fn test_disabled_and_cancelled_launchers_are_skipped() {
    let env = LibraryTestEnv::new();
    env.steam.report(vec![alpha()]);
    env.ea.report(vec![shared("ea-1")]);
    let library = env.library().with_disabled_launchers([LauncherKind::EAApp]);

    let report = library.scan_all();
    assert_eq!(report.scans.len(), 1);
    assert!(matches!(
        library.scan_launcher(LauncherKind::EAApp),
        Err(LibraryError::LauncherDisabled(LauncherKind::EAApp))
    ));

    library.cancel_flag().cancel();
    let report = library.scan_all();
    assert!(report.scans.is_empty());
    assert_eq!(report.failures, vec![(LauncherKind::Steam, "scan cancelled".to_string())]);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic]
fn test_scanning_manual_games_is_a_bug() {
    let env = LibraryTestEnv::new();
    let _ = env.library().scan_launcher(LauncherKind::Manual);
}

#[test]
fn test_launch_stamps_last_played_and_opens_uri() {
    let env = LibraryTestEnv::new();
    env.steam.report(vec![alpha().with_launch_command("steam://rungameid/42")]);
    let library = env.library();
    library.scan_launcher(LauncherKind::Steam).unwrap();
    let id = library.list_all().unwrap()[0].id;

    let outcome = library.try_launch(id);

    assert!(outcome.is_success());
    assert_eq!(env.spawner.records(), vec![SpawnRecord::Uri("steam://rungameid/42".to_string())]);
    assert_eq!(library.list_recent(5).unwrap()[0].id, id);
    assert!(library.game(id).unwrap().unwrap().last_played.is_some());
}

#[test]
fn test_launch_rejects_interpreter_command() {
    let env = LibraryTestEnv::new();
    let library = env.library();

    let mut record = GameRecord::new(LauncherKind::Manual, "Trap", Utc::now());
    record.launch_command = Some("cmd.exe /c del *".to_string());
    let id = library.repository().insert_game(&record).unwrap();

    assert_eq!(library.try_launch(id), LaunchOutcome::InvalidCommand);
    assert!(env.spawner.records().is_empty());
    assert!(library.game(id).unwrap().unwrap().last_played.is_some());

    assert_eq!(library.try_launch(9999), LaunchOutcome::GameNotFound);
}

#[test]
fn test_launch_for_uninstalled_launcher() {
    let env = LibraryTestEnv::new();
    env.steam.report(vec![alpha().with_launch_command("steam://rungameid/42")]);
    let library = env.library();
    library.scan_launcher(LauncherKind::Steam).unwrap();
    let id = library.list_all().unwrap()[0].id;

    env.steam.uninstall();
    library.scan_launcher(LauncherKind::Steam).unwrap();

    // Falls back to the executable, which still exists
    assert!(library.try_launch(id).is_success());
    assert!(matches!(env.spawner.records()[0], SpawnRecord::Program { .. }));
}

#[test]
fn test_manual_games() {
    let env = LibraryTestEnv::new();
    let library = env.library();

    let record = library
        .add_manual_game("Alpha™ ", Path::new(r"C:\G\Alpha.exe"), Some("  "))
        .unwrap();
    assert_eq!(record.name, "Alpha");
    assert_eq!(record.launcher, LauncherKind::Manual);
    assert_eq!(record.install_path.as_deref(), Some(r"C:\G"));
    assert!(record.launch_command.is_none());

    assert!(matches!(
        library.add_manual_game("Again", Path::new(r"c:/g/alpha.EXE"), None),
        Err(LibraryError::InvalidGame(_))
    ));
    assert!(matches!(
        library.add_manual_game("Bad", Path::new(r"C:\G\Bad.exe"), Some("powershell -c x")),
        Err(LibraryError::InvalidGame(_))
    ));
    assert!(matches!(
        library.add_manual_game("   ", Path::new(r"C:\G\Blank.exe"), None),
        Err(LibraryError::InvalidGame(_))
    ));

    assert_eq!(library.search("alp").unwrap().len(), 1);
    library.remove_game(record.id).unwrap();
    assert!(matches!(library.remove_game(record.id), Err(LibraryError::GameNotFound(_))));
}

#[test]
fn test_library_survives_reopen() {
    let env = LibraryTestEnv::new();
    env.steam.report(vec![alpha()]);
    env.library().scan_launcher(LauncherKind::Steam).unwrap();

    let reopened = env.library();
    assert_eq!(reopened.list_all().unwrap().len(), 1);
    assert!(env.db_path.exists());
}

#[test]
fn test_scan_from_config_with_real_probes() {
    let env = LibraryTestEnv::new();
    let system = MemorySystem::windows_layout()
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
        .with_file(r"C:\Program Files (x86)\Steam\steamapps\common\Portal 2\portal2.exe", "MZ");

    let mut config = GameVaultConfig::default();
    config.scan.drive_scan = false;
    config.scan.disabled_launchers = vec!["roblox".to_string()];
    config.dedup.priority = vec!["gog_galaxy".to_string(), "steam".to_string()];

    let repository = Arc::new(SqliteRepository::open(&env.db_path).unwrap());
    let library = GameLibrary::from_config(&config, Arc::new(system), repository, Arc::new(env.spawner.clone()));
    let report = library.scan_all();

    assert!(report.failures.is_empty());
    assert_eq!(report.scans.len(), 9);
    assert_eq!(report.installed_launchers().collect::<Vec<_>>(), vec![LauncherKind::Steam]);

    let games = library.list_all().unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].name, "Portal 2");
    assert_eq!(games[0].launch_command.as_deref(), Some("steam://rungameid/620"));

    assert!(library.try_launch(games[0].id).is_success());
}
