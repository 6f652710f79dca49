//! GameVault command line front end
//!
//! Scans the installed launchers into the local library, lists and searches it,
//! and starts games through the launch resolver.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use gamevault_config::GameVaultConfig;
use gamevault_detect::LauncherKind;
use gamevault_launch::OsSpawner;
use gamevault_library::{GameLibrary, GameRecord, ScanReport, SqliteRepository};
use gamevault_platform::OsSystem;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Unified library of games installed through PC launchers
#[derive(Debug, Parser)]
#[command(name = "gamevault")]
#[command(about = "Unified library of games installed through PC launchers")]
struct Cli {
    /// Configuration file layered over the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Library database, overrides the configured location
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Detect installed games and update the library
    Scan {
        /// Only scan this launcher
        #[arg(long)]
        launcher: Option<LauncherKind>,

        /// Give up after this many seconds, keeping what was already saved
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show which launchers are installed
    Launchers,

    /// List the library
    List {
        /// Only the N most recently played games
        #[arg(long, value_name = "N")]
        recent: Option<usize>,
    },

    /// Find games by name
    Search { text: String },

    /// Start a game
    Launch { id: i64 },

    /// Add a game no launcher knows about
    Add {
        name: String,

        #[arg(long)]
        exe: PathBuf,

        /// URI or command line used instead of the executable
        #[arg(long)]
        command: Option<String>,
    },

    /// Remove a game from the library
    Remove { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let library = Arc::new(open_library(&cli, &config)?);

    match cli.command {
        Commands::Scan { launcher, timeout } => {
            let report = scan(library, launcher, timeout.map(Duration::from_secs)).await?;
            print_report(&report);
        }
        Commands::Launchers => {
            let states = library.launcher_states()?;
            for state in states {
                let status = match (state.installed, state.last_scan) {
                    (_, None) => "not scanned",
                    (true, Some(_)) => "installed",
                    (false, Some(_)) => "not installed",
                };
                println!(
                    "{:<16} {:<14} {}",
                    state.launcher.display_name(),
                    status,
                    state.install_path.as_deref().unwrap_or("")
                );
            }
        }
        Commands::List { recent } => {
            let games = match recent {
                Some(limit) => library.list_recent(limit)?,
                None => library.list_all()?,
            };
            print_games(&games);
        }
        Commands::Search { text } => print_games(&library.search(&text)?),
        Commands::Launch { id } => {
            let outcome = library.try_launch(id);
            if !outcome.is_success() {
                bail!("Could not launch game {}: {}", id, outcome);
            }
            println!("{}", outcome);
        }
        Commands::Add { name, exe, command } => {
            let record = library
                .add_manual_game(&name, &exe, command.as_deref())
                .with_context(|| format!("Failed to add {}", name))?;
            println!("{}", describe(&record));
        }
        Commands::Remove { id } => {
            library
                .remove_game(id)
                .with_context(|| format!("Failed to remove game {}", id))?;
            println!("Removed game {}", id);
        }
    }

    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<GameVaultConfig> {
    let config = match &cli.config {
        Some(path) => GameVaultConfig::load_layered(Some(path))
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => GameVaultConfig::load_default().context("Failed to load config")?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn open_library(cli: &Cli, config: &GameVaultConfig) -> Result<GameLibrary> {
    let database = cli
        .database
        .clone()
        .unwrap_or_else(|| config.library.database_path());
    info!("Opening library at {}", database.display());

    let repository = SqliteRepository::open(&database)
        .with_context(|| format!("Failed to open library at {}", database.display()))?;

    Ok(GameLibrary::from_config(
        config,
        Arc::new(OsSystem::new()),
        Arc::new(repository),
        Arc::new(OsSpawner::new()),
    ))
}

/// Run the scan off the async runtime, raising the cancel flag on timeout
async fn scan(library: Arc<GameLibrary>, launcher: Option<LauncherKind>, timeout: Option<Duration>) -> Result<ScanReport> {
    let cancel = library.cancel_flag();
    let mut worker = tokio::task::spawn_blocking(move || match launcher {
        Some(kind) => library.scan_launcher(kind).map(|scan| ScanReport {
            scans: vec![scan],
            ..ScanReport::default()
        }),
        None => Ok(library.scan_all()),
    });

    // The worker must be awaited exactly once to completion
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut worker).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("Scan exceeded {:?}, cancelling", limit);
                cancel.cancel();
                worker.await
            }
        },
        None => worker.await,
    };

    let report = joined.context("Scan task failed")??;
    Ok(report)
}

fn print_report(report: &ScanReport) {
    for scan in &report.scans {
        if scan.installed {
            println!(
                "{:<16} {} found, {} added, {} updated, {} removed",
                scan.launcher.display_name(),
                scan.detected,
                scan.inserted,
                scan.updated,
                scan.removed
            );
        } else {
            println!("{:<16} not installed", scan.launcher.display_name());
        }
    }
    for (launcher, reason) in &report.failures {
        println!("{:<16} failed: {}", launcher.display_name(), reason);
    }
    if report.duplicates_removed > 0 {
        println!("{} duplicate(s) removed", report.duplicates_removed);
    }
}

fn print_games(games: &[GameRecord]) {
    if games.is_empty() {
        println!("No games");
        return;
    }
    for game in games {
        println!("{}", describe(game));
    }
}

fn describe(game: &GameRecord) -> String {
    let mut line = format!("{:>5}  {:<16} {}", game.id, game.launcher.display_name(), game.name);
    if let Some(played) = game.last_played {
        line.push_str(&format!("  (played {})", played.format("%Y-%m-%d %H:%M")));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_with_launcher() {
        let cli = Cli::try_parse_from(["gamevault", "scan", "--launcher", "epic_games", "--timeout", "30"]).unwrap();
        match cli.command {
            Commands::Scan { launcher, timeout } => {
                assert_eq!(launcher, Some(LauncherKind::EpicGames));
                assert_eq!(timeout, Some(30));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_launcher() {
        assert!(Cli::try_parse_from(["gamevault", "scan", "--launcher", "itch"]).is_err());
    }

    #[test]
    fn test_parse_add_with_global_database() {
        let cli = Cli::try_parse_from([
            "gamevault",
            "add",
            "Homebrew",
            "--exe",
            "/opt/homebrew/run",
            "--database",
            "/tmp/library.db",
        ])
        .unwrap();

        assert_eq!(cli.database, Some(PathBuf::from("/tmp/library.db")));
        match cli.command {
            Commands::Add { name, exe, command } => {
                assert_eq!(name, "Homebrew");
                assert_eq!(exe, PathBuf::from("/opt/homebrew/run"));
                assert!(command.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_describe_game() {
        use chrono::TimeZone;

        let added = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut game = GameRecord::new(LauncherKind::Steam, "Portal 2", added);
        game.id = 7;
        assert_eq!(describe(&game), "    7  Steam            Portal 2");

        game.last_played = Some(chrono::Utc.with_ymd_and_hms(2024, 6, 2, 18, 30, 0).unwrap());
        assert!(describe(&game).ends_with("(played 2024-06-02 18:30)"));
    }

    #[tokio::test]
    async fn test_scan_of_empty_registry_reports_nothing() {
        use gamevault_detect::ProbeRegistry;
        use gamevault_launch::{LaunchPolicy, LaunchResolver, mock::RecordingSpawner};
        use gamevault_platform::mock::MemorySystem;

        let system: gamevault_platform::SharedSystem = Arc::new(MemorySystem::new());
        let resolver = LaunchResolver::new(system, Arc::new(RecordingSpawner::new()), LaunchPolicy::new());
        let library = GameLibrary::new(
            Arc::new(SqliteRepository::in_memory().unwrap()),
            ProbeRegistry::empty(),
            resolver,
        );

        let library = Arc::new(library);
        let report = scan(Arc::clone(&library), None, Some(Duration::from_secs(5))).await.unwrap();
        assert!(report.scans.is_empty());
        assert!(report.failures.is_empty());

        let report = scan(library, None, None).await.unwrap();
        assert!(report.scans.is_empty());
    }

    #[tokio::test]
    async fn test_scan_past_its_timeout_still_reports() {
        use gamevault_detect::{DetectedGame, DetectionResult, InstallLocation, LauncherProbe, ProbeRegistry};
        use gamevault_launch::{LaunchPolicy, LaunchResolver, mock::RecordingSpawner};
        use gamevault_platform::mock::MemorySystem;

        struct SlowProbe;

        impl LauncherProbe for SlowProbe {
            fn launcher(&self) -> LauncherKind {
                LauncherKind::Steam
            }

            fn resolve_install_path(&self) -> Option<InstallLocation> {
                Some(InstallLocation::Path(PathBuf::from(r"C:\Steam")))
            }

            fn detect_games(&self) -> DetectionResult {
                std::thread::sleep(Duration::from_millis(200));
                DetectionResult::installed(
                    LauncherKind::Steam,
                    InstallLocation::Path(PathBuf::from(r"C:\Steam")),
                    vec![DetectedGame::new("Portal 2").with_external_id("620")],
                    Vec::new(),
                )
            }
        }

        let system: gamevault_platform::SharedSystem = Arc::new(MemorySystem::new());
        let resolver = LaunchResolver::new(system, Arc::new(RecordingSpawner::new()), LaunchPolicy::new());
        let mut probes = ProbeRegistry::empty();
        probes.register(Box::new(SlowProbe));
        let library = GameLibrary::new(Arc::new(SqliteRepository::in_memory().unwrap()), probes, resolver);

        let report = scan(Arc::new(library), Some(LauncherKind::Steam), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert_eq!(report.scans.len(), 1);
        assert_eq!(report.scans[0].inserted, 1);
    }
}
