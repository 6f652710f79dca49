//! Platform access layer
//!
//! Every launcher probe reads the machine through the [`SystemAccess`] trait so that
//! detection logic can run against the real registry and filesystem in production and
//! against an in-memory [`mock::MemorySystem`] in tests.
//!
//! # Example
//!
//! ```no_run
//! use gamevault_platform::{Hive, OsSystem, RegistryView, SystemAccess};
//!
//! let system = OsSystem::new();
//! let steam = system.read_registry_string(
//!     Hive::LocalMachine,
//!     r"SOFTWARE\Valve\Steam",
//!     "InstallPath",
//!     RegistryView::Registry32,
//! );
//! println!("Steam: {:?}", steam);
//! ```

mod budget;
pub mod mock;
mod os;
mod paths;

pub use budget::{CancelFlag, ScanBudget};
pub use os::OsSystem;
pub use paths::{file_name_of, file_stem_of, glob_matcher, is_under, path_key};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Registry root hive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Hive {
    /// HKEY_LOCAL_MACHINE
    LocalMachine,
    /// HKEY_CURRENT_USER
    CurrentUser,
}

/// Registry view to open a key with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegistryView {
    /// Whatever view the current process gets by default
    Default,
    /// Native 64-bit view
    Registry64,
    /// WOW6432Node redirected 32-bit view
    Registry32,
}

/// Well-known directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KnownFolder {
    ProgramFiles,
    ProgramFilesX86,
    ProgramData,
    LocalAppData,
    RoamingAppData,
    UserProfile,
    SystemRoot,
    System,
}

/// A single directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub size: u64,
}

/// Read-only view of the registry and filesystem
pub trait SystemAccess: Send + Sync {
    /// Read a string value. DWORD values are rendered as decimal.
    fn read_registry_string(
        &self,
        hive: Hive,
        key: &str,
        value: &str,
        view: RegistryView,
    ) -> Option<String>;

    /// Names of the direct subkeys of `key`, empty if the key is missing
    fn registry_subkeys(&self, hive: Hive, key: &str, view: RegistryView) -> Vec<String>;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn file_size(&self, path: &Path) -> Option<u64>;

    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Files directly inside `dir` whose name matches `pattern` (`*` and `?`, case-insensitive)
    fn glob(&self, dir: &Path, pattern: &str) -> Vec<PathBuf> {
        let Some(matcher) = glob_matcher(pattern) else {
            return Vec::new();
        };

        let mut matches: Vec<PathBuf> = self
            .list_dir(dir)
            .unwrap_or_default()
            .into_iter()
            .filter(|entry| !entry.is_dir && matcher.is_match(&entry.name))
            .map(|entry| entry.path)
            .collect();
        matches.sort();
        matches
    }

    fn known_folder(&self, folder: KnownFolder) -> Option<PathBuf>;

    /// Root directories of local drives
    fn fixed_drives(&self) -> Vec<PathBuf>;
}

/// Shared handle used by probes and the launch resolver
pub type SharedSystem = Arc<dyn SystemAccess>;
