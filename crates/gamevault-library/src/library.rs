//! Library facade

use crate::LibraryError;
use crate::dedup::{parse_launchers, plan_dedup};
use crate::icons::{IconSink, NoopIconSink};
use crate::models::{GameRecord, LauncherScan, LauncherState, ScanReport, path_string};
use crate::reconcile::{AppliedMerge, MergePlan, plan_merge};
use crate::repository::LibraryRepository;
use chrono::Utc;
use gamevault_config::GameVaultConfig;
use gamevault_detect::{DetectSettings, LauncherKind, ProbeContext, ProbeRegistry, helpers};
use gamevault_launch::{LaunchOutcome, LaunchPolicy, LaunchRequest, LaunchResolver, ProcessSpawner};
use gamevault_platform::{CancelFlag, SharedSystem};
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Entry point for front ends
pub struct GameLibrary {
    repository: Arc<dyn LibraryRepository>,
    probes: ProbeRegistry,
    resolver: LaunchResolver,
    icons: Arc<dyn IconSink>,
    dedup_priority: Vec<LauncherKind>,
    disabled: BTreeSet<LauncherKind>,
    cancel: CancelFlag,
}

impl GameLibrary {
    pub fn new(repository: Arc<dyn LibraryRepository>, probes: ProbeRegistry, resolver: LaunchResolver) -> Self {
        Self {
            repository,
            probes,
            resolver,
            icons: Arc::new(NoopIconSink),
            dedup_priority: vec![LauncherKind::Steam],
            disabled: BTreeSet::new(),
            cancel: CancelFlag::new(),
        }
    }

    /// Build the probes and launch policy described by `config`
    pub fn from_config(
        config: &GameVaultConfig,
        system: SharedSystem,
        repository: Arc<dyn LibraryRepository>,
        spawner: Arc<dyn ProcessSpawner>,
    ) -> Self {
        let cancel = CancelFlag::new();
        let settings = DetectSettings {
            drive_scan: config.scan.drive_scan,
            drive_scan_depth: config.scan.drive_scan_depth,
            drive_scan_timeout: Duration::from_secs(config.scan.drive_scan_timeout_secs),
            extra_roots: config.scan.extra_roots.clone(),
            cancel: cancel.clone(),
        };
        let probes = ProbeRegistry::with_default_probes(ProbeContext::new(system.clone()).with_settings(settings));

        let policy = LaunchPolicy::new()
            .with_extra_schemes(&config.launch.extra_uri_schemes)
            .with_extra_denied(&config.launch.extra_denied_interpreters);
        let resolver = LaunchResolver::new(system, spawner, policy);

        let mut library = Self::new(repository, probes, resolver)
            .with_dedup_priority(parse_launchers(&config.dedup.priority))
            .with_disabled_launchers(parse_launchers(&config.scan.disabled_launchers));
        library.cancel = cancel;
        library
    }

    pub fn with_icon_sink(mut self, icons: Arc<dyn IconSink>) -> Self {
        self.icons = icons;
        self
    }

    /// Launchers that win duplicate groups, best first
    pub fn with_dedup_priority(mut self, priority: Vec<LauncherKind>) -> Self {
        self.dedup_priority = priority;
        self
    }

    pub fn with_disabled_launchers(mut self, launchers: impl IntoIterator<Item = LauncherKind>) -> Self {
        self.disabled = launchers.into_iter().collect();
        self
    }

    /// Raising this flag stops heuristic walks and skips launchers not yet scanned
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn repository(&self) -> &Arc<dyn LibraryRepository> {
        &self.repository
    }

    /// Scan every enabled launcher in order, then remove duplicates
    ///
    /// A failing launcher is recorded in the report; the others still run and what
    /// they committed stays committed.
    pub fn scan_all(&self) -> ScanReport {
        let mut report = ScanReport::default();

        for probe in self.probes.iter() {
            let kind = probe.launcher();
            if self.disabled.contains(&kind) {
                tracing::debug!("Skipping disabled launcher {}", kind);
                continue;
            }
            if self.cancel.is_cancelled() {
                report.failures.push((kind, "scan cancelled".to_string()));
                continue;
            }

            match self.scan_launcher(kind) {
                Ok(scan) => report.scans.push(scan),
                Err(e) => {
                    tracing::warn!("Scan of {} failed: {}", kind, e);
                    report.failures.push((kind, e.to_string()));
                }
            }
        }

        match self.deduplicate() {
            Ok(removed) => report.duplicates_removed = removed,
            Err(e) => tracing::warn!("Duplicate removal failed: {}", e),
        }

        tracing::info!(
            "Scan complete: {} launcher(s) installed, {} game(s) detected, {} failure(s)",
            report.installed_launchers().count(),
            report.total_detected(),
            report.failures.len()
        );
        report
    }

    /// Detect one launcher's games and merge them into the library
    pub fn scan_launcher(&self, kind: LauncherKind) -> Result<LauncherScan, LibraryError> {
        debug_assert!(kind.is_probed(), "{} games cannot be scanned", kind.key());
        if !kind.is_probed() {
            return Err(LibraryError::UnsupportedLauncher(kind));
        }
        if self.disabled.contains(&kind) {
            return Err(LibraryError::LauncherDisabled(kind));
        }
        let probe = self
            .probes
            .get(kind)
            .ok_or(LibraryError::UnsupportedLauncher(kind))?;

        let result = catch_unwind(AssertUnwindSafe(|| probe.detect_games())).map_err(|_| {
            tracing::warn!("{} probe panicked", kind);
            LibraryError::ProbeFailed(kind)
        })?;

        let now = Utc::now();
        self.repository.upsert_launcher_state(&LauncherState {
            launcher: kind,
            installed: result.installed,
            install_path: result.install_path.as_ref().map(|location| location.to_string()),
            last_scan: Some(now),
        })?;

        if !result.installed {
            tracing::debug!("{} not installed", kind);
            return Ok(LauncherScan {
                launcher: kind,
                installed: false,
                detected: 0,
                inserted: 0,
                updated: 0,
                removed: 0,
                diagnostic: result.diagnostic,
            });
        }

        let existing = self.repository.games_by_launcher(kind)?;
        if !result.complete {
            tracing::warn!("{} scan was partial, keeping games it did not see", kind);
        }
        let plan = plan_merge(kind, &existing, &result.games, result.complete, now);
        let applied = if plan.is_empty() {
            AppliedMerge::default()
        } else {
            self.repository.apply_merge(&plan)?
        };
        self.request_icons(&plan, &applied);

        tracing::info!(
            "{}: {} detected, {} added, {} updated, {} removed",
            kind,
            result.games.len(),
            applied.inserted.len(),
            applied.updated.len(),
            applied.deleted
        );

        Ok(LauncherScan {
            launcher: kind,
            installed: true,
            detected: result.games.len(),
            inserted: applied.inserted.len(),
            updated: applied.updated.len(),
            removed: applied.deleted,
            diagnostic: result.diagnostic,
        })
    }

    fn request_icons(&self, plan: &MergePlan, applied: &AppliedMerge) {
        let inserted = plan.inserts.iter().zip(&applied.inserted).map(|(record, id)| (*id, record));
        let updated = plan
            .updates
            .iter()
            .filter(|record| applied.updated.contains(&record.id))
            .map(|record| (record.id, record));

        for (id, record) in inserted.chain(updated) {
            if let Some(source) = record.icon_source() {
                self.icons.request_icon(id, Path::new(source));
            }
        }
    }

    pub fn detect_installed_launchers(&self) -> BTreeMap<LauncherKind, bool> {
        self.probes.detect_installed()
    }

    /// Start a game, recording the attempt as its last play time
    pub fn try_launch(&self, id: i64) -> LaunchOutcome {
        let record = match self.repository.game(id) {
            Ok(Some(record)) => record,
            Ok(None) => return LaunchOutcome::GameNotFound,
            Err(e) => {
                tracing::warn!("Could not load game {}: {}", id, e);
                return LaunchOutcome::GameNotFound;
            }
        };

        if let Err(e) = self.repository.set_last_played(id, Utc::now()) {
            tracing::warn!("Could not record play time for {}: {}", record.name, e);
        }

        let launcher_installed = match self.repository.launcher_state(record.launcher) {
            Ok(Some(state)) => state.may_be_installed(),
            _ => true,
        };
        let request = LaunchRequest::new(
            record.launch_command.as_deref(),
            record.executable_path.as_deref().map(Path::new),
        )
        .with_launcher_installed(launcher_installed);

        let outcome = self.resolver.launch_request(&request);
        tracing::info!("Launch of {}: {}", record.name, outcome);
        outcome
    }

    pub fn search(&self, text: &str) -> Result<Vec<GameRecord>, LibraryError> {
        self.repository.search_by_name(text)
    }

    pub fn list_all(&self) -> Result<Vec<GameRecord>, LibraryError> {
        self.repository.list_games()
    }

    pub fn list_recent(&self, limit: usize) -> Result<Vec<GameRecord>, LibraryError> {
        self.repository.recent_games(limit)
    }

    pub fn game(&self, id: i64) -> Result<Option<GameRecord>, LibraryError> {
        self.repository.game(id)
    }

    pub fn launcher_states(&self) -> Result<Vec<LauncherState>, LibraryError> {
        self.repository.launcher_states()
    }

    /// Add a game no launcher knows about
    pub fn add_manual_game(
        &self,
        name: &str,
        executable: &Path,
        launch_command: Option<&str>,
    ) -> Result<GameRecord, LibraryError> {
        let name = helpers::clean_title(name);
        if name.is_empty() {
            return Err(LibraryError::InvalidGame("name is empty".to_string()));
        }

        let launch_command = launch_command.map(str::trim).filter(|c| !c.is_empty());
        if let Some(command) = launch_command {
            if !self.resolver.is_valid_launch_command(command) {
                return Err(LibraryError::InvalidGame(format!("launch command rejected: {}", command)));
            }
        }

        let executable_path = path_string(executable);
        let already_added = self
            .repository
            .games_by_executable(&executable_path)?
            .iter()
            .any(|game| game.launcher == LauncherKind::Manual);
        if already_added {
            return Err(LibraryError::InvalidGame(format!("{} is already in the library", executable_path)));
        }

        let mut record = GameRecord::new(LauncherKind::Manual, name, Utc::now());
        record.install_path = helpers::parent_of(executable).map(|dir| path_string(&dir));
        record.executable_path = Some(executable_path);
        record.launch_command = launch_command.map(str::to_string);
        record.id = self.repository.insert_game(&record)?;

        tracing::info!("Added {} ({})", record.name, record.id);
        if let Some(source) = record.icon_source() {
            self.icons.request_icon(record.id, Path::new(source));
        }
        Ok(record)
    }

    pub fn remove_game(&self, id: i64) -> Result<(), LibraryError> {
        if self.repository.delete_game(id)? {
            Ok(())
        } else {
            Err(LibraryError::GameNotFound(id))
        }
    }

    /// Remove cross-launcher duplicates, returning how many records were deleted
    pub fn deduplicate(&self) -> Result<usize, LibraryError> {
        let records = self.repository.list_games()?;
        let deletes = plan_dedup(&records, &self.dedup_priority);
        if deletes.is_empty() {
            return Ok(0);
        }

        let removed = self.repository.delete_games(&deletes)?;
        tracing::info!("Removed {} duplicate game(s)", removed);
        Ok(removed)
    }
}
