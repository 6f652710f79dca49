//! Launcher detection for GameVault
//!
//! One probe per supported launcher locates the launcher on this machine and
//! enumerates the games it manages from whatever the vendor leaves on disk:
//! registry trees, VDF/JSON/YAML manifests, binary databases or, as a last
//! resort, a bounded walk of likely install roots.
//!
//! Probes never fail: every problem ends up as a diagnostic on the returned
//! [`DetectionResult`].

pub mod helpers;
mod kind;
pub mod probes;
mod registry;
pub mod vdf;

pub use kind::{LauncherKind, ParseLauncherError};
pub use registry::ProbeRegistry;

use gamevault_platform::{CancelFlag, ScanBudget, SharedSystem};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why a probe could not use a piece of vendor data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeIssue {
    /// Expected absence: launcher or manifest simply not there
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// Malformed vendor data for a single candidate
    #[error("could not parse {candidate}: {reason}")]
    ParseFailure { candidate: String, reason: String },

    /// Candidate parsed but failed a validity rule
    #[error("rejected {candidate}: {reason}")]
    Rejected { candidate: String, reason: String },
}

impl ProbeIssue {
    pub fn parse(candidate: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::ParseFailure {
            candidate: candidate.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn rejected(candidate: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Rejected {
            candidate: candidate.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Where a launcher lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallLocation {
    /// Regular install directory
    Path(PathBuf),
    /// Store-distributed app reached through a shell identifier
    ShellApp(String),
}

impl InstallLocation {
    pub fn as_path(&self) -> Option<&PathBuf> {
        match self {
            InstallLocation::Path(path) => Some(path),
            InstallLocation::ShellApp(_) => None,
        }
    }
}

impl fmt::Display for InstallLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallLocation::Path(path) => write!(f, "{}", path.display()),
            InstallLocation::ShellApp(id) => write!(f, "{}", id),
        }
    }
}

/// A game as a probe saw it during one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedGame {
    pub name: String,
    pub install_path: Option<PathBuf>,
    pub executable_path: Option<PathBuf>,
    /// URI or command line used to start the game
    pub launch_command: Option<String>,
    /// Vendor's own stable id, the reconciliation join key
    pub external_id: Option<String>,
    /// File an icon can be extracted from
    pub icon_hint: Option<PathBuf>,
}

impl DetectedGame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    pub fn with_install_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_path = Some(path.into());
        self
    }

    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    pub fn with_launch_command(mut self, command: impl Into<String>) -> Self {
        self.launch_command = Some(command.into());
        self
    }

    pub fn with_icon_hint(mut self, path: impl Into<PathBuf>) -> Self {
        self.icon_hint = Some(path.into());
        self
    }

    /// External id if present and not blank
    pub fn join_key(&self) -> Option<&str> {
        self.external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Outcome of one probe's `detect_games`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionResult {
    pub launcher: LauncherKind,
    pub installed: bool,
    pub install_path: Option<InstallLocation>,
    pub games: Vec<DetectedGame>,
    /// Human-readable note for a failed or partial probe
    pub diagnostic: Option<String>,
    /// Candidates that were skipped and why
    pub issues: Vec<ProbeIssue>,
    /// Every data source was read to the end; games missing from `games` are gone
    pub complete: bool,
}

impl DetectionResult {
    pub fn not_installed(launcher: LauncherKind, reason: impl Into<String>) -> Self {
        Self {
            launcher,
            installed: false,
            install_path: None,
            games: Vec::new(),
            diagnostic: Some(reason.into()),
            issues: Vec::new(),
            complete: false,
        }
    }

    pub fn installed(
        launcher: LauncherKind,
        install_path: InstallLocation,
        games: Vec<DetectedGame>,
        issues: Vec<ProbeIssue>,
    ) -> Self {
        let diagnostic = if issues.is_empty() {
            None
        } else {
            Some(format!("{} candidate(s) skipped", issues.len()))
        };

        Self {
            launcher,
            installed: true,
            install_path: Some(install_path),
            games,
            diagnostic,
            issues,
            complete: true,
        }
    }

    /// Mark the run as cut short: the games found still count, absent ones must be kept
    pub fn partial(mut self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        self.complete = false;
        self.diagnostic = Some(match self.diagnostic.take() {
            Some(existing) => format!("{}; {}", existing, reason),
            None => reason,
        });
        self
    }
}

/// Knobs shared by every probe
#[derive(Debug, Clone)]
pub struct DetectSettings {
    /// Allow walking every local drive root
    pub drive_scan: bool,
    pub drive_scan_depth: usize,
    pub drive_scan_timeout: Duration,
    /// Extra roots for heuristic walks
    pub extra_roots: Vec<PathBuf>,
    pub cancel: CancelFlag,
}

impl Default for DetectSettings {
    fn default() -> Self {
        Self {
            drive_scan: true,
            drive_scan_depth: 3,
            drive_scan_timeout: Duration::from_secs(30),
            extra_roots: Vec::new(),
            cancel: CancelFlag::new(),
        }
    }
}

impl DetectSettings {
    /// Fresh budget for one heuristic walk
    pub fn budget(&self) -> ScanBudget {
        ScanBudget::new(self.drive_scan_depth)
            .with_timeout(self.drive_scan_timeout)
            .with_cancel(self.cancel.clone())
    }
}

/// Everything a probe needs from the outside world
#[derive(Clone)]
pub struct ProbeContext {
    pub system: SharedSystem,
    pub settings: DetectSettings,
}

impl ProbeContext {
    pub fn new(system: SharedSystem) -> Self {
        Self {
            system,
            settings: DetectSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: DetectSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl fmt::Debug for ProbeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Capability set every launcher integration provides
pub trait LauncherProbe: Send + Sync {
    fn launcher(&self) -> LauncherKind;

    /// Locate the launcher, first success wins
    fn resolve_install_path(&self) -> Option<InstallLocation>;

    fn probe_installed(&self) -> bool {
        self.resolve_install_path().is_some()
    }

    /// Enumerate installed games; never panics on bad vendor data
    fn detect_games(&self) -> DetectionResult;
}
