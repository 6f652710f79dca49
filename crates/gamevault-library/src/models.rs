//! Persisted library records

use chrono::{DateTime, Utc};
use gamevault_detect::LauncherKind;
use std::path::Path;

/// A game in the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub id: i64,
    pub launcher: LauncherKind,
    pub name: String,
    pub install_path: Option<String>,
    pub executable_path: Option<String>,
    pub launch_command: Option<String>,
    pub icon_path: Option<String>,
    pub last_played: Option<DateTime<Utc>>,
    pub date_added: DateTime<Utc>,
    pub external_id: Option<String>,
}

impl GameRecord {
    /// Unsaved record, `id` is assigned on insert
    pub fn new(launcher: LauncherKind, name: impl Into<String>, date_added: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            launcher,
            name: name.into(),
            install_path: None,
            executable_path: None,
            launch_command: None,
            icon_path: None,
            last_played: None,
            date_added,
            external_id: None,
        }
    }

    /// External id if present and not blank
    pub fn join_key(&self) -> Option<&str> {
        self.external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Best file to extract an icon from
    pub fn icon_source(&self) -> Option<&str> {
        self.icon_path
            .as_deref()
            .or(self.executable_path.as_deref())
            .or(self.install_path.as_deref())
    }
}

/// Last known state of one launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherState {
    pub launcher: LauncherKind,
    pub installed: bool,
    pub install_path: Option<String>,
    pub last_scan: Option<DateTime<Utc>>,
}

impl LauncherState {
    /// Never scanned
    pub fn unknown(launcher: LauncherKind) -> Self {
        Self {
            launcher,
            installed: false,
            install_path: None,
            last_scan: None,
        }
    }

    /// Installed, or not yet scanned so nothing says otherwise
    pub fn may_be_installed(&self) -> bool {
        self.installed || self.last_scan.is_none()
    }
}

/// Outcome of scanning one launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherScan {
    pub launcher: LauncherKind,
    pub installed: bool,
    pub detected: usize,
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    pub diagnostic: Option<String>,
}

/// Outcome of a full library scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub scans: Vec<LauncherScan>,
    /// Launchers whose scan failed, with the reason
    pub failures: Vec<(LauncherKind, String)>,
    pub duplicates_removed: usize,
}

impl ScanReport {
    pub fn installed_launchers(&self) -> impl Iterator<Item = LauncherKind> + '_ {
        self.scans.iter().filter(|scan| scan.installed).map(|scan| scan.launcher)
    }

    pub fn total_detected(&self) -> usize {
        self.scans.iter().map(|scan| scan.detected).sum()
    }
}

pub(crate) fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
