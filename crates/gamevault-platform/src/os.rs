//! Real registry and filesystem binding

use crate::{DirEntry, Hive, KnownFolder, RegistryView, SystemAccess};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Production [`SystemAccess`] backed by the OS
///
/// Registry reads only return data on Windows; elsewhere every registry
/// lookup reports absence and probes fall through to their file-based paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSystem;

impl OsSystem {
    pub fn new() -> Self {
        Self
    }
}

impl SystemAccess for OsSystem {
    fn read_registry_string(
        &self,
        hive: Hive,
        key: &str,
        value: &str,
        view: RegistryView,
    ) -> Option<String> {
        registry::read_string(hive, key, value, view)
    }

    fn registry_subkeys(&self, hive: Hive, key: &str, view: RegistryView) -> Vec<String> {
        registry::subkeys(hive, key, view)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = fs::read(path)?;
        // Vendor files are not always valid UTF-8 (binary databases, BOMs)
        let text = String::from_utf8_lossy(&bytes);
        Ok(text.trim_start_matches('\u{feff}').to_string())
    }

    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn file_size(&self, path: &Path) -> Option<u64> {
        fs::metadata(path).ok().map(|m| m.len())
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(path)? {
            let Ok(entry) = entry else {
                continue;
            };
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry.path(),
                is_dir: metadata.is_dir(),
                size: if metadata.is_file() { metadata.len() } else { 0 },
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn known_folder(&self, folder: KnownFolder) -> Option<PathBuf> {
        let from_env = |name: &str| std::env::var_os(name).map(PathBuf::from);

        match folder {
            KnownFolder::ProgramFiles => from_env("ProgramW6432").or_else(|| from_env("ProgramFiles")),
            KnownFolder::ProgramFilesX86 => from_env("ProgramFiles(x86)"),
            KnownFolder::ProgramData => from_env("ProgramData"),
            KnownFolder::LocalAppData => dirs::data_local_dir(),
            KnownFolder::RoamingAppData => dirs::data_dir(),
            KnownFolder::UserProfile => dirs::home_dir(),
            KnownFolder::SystemRoot => from_env("SystemRoot"),
            KnownFolder::System => from_env("SystemRoot").map(|root| root.join("System32")),
        }
    }

    fn fixed_drives(&self) -> Vec<PathBuf> {
        if !cfg!(windows) {
            return Vec::new();
        }

        (b'C'..=b'Z')
            .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
            .filter(|root| root.is_dir())
            .collect()
    }
}

#[cfg(windows)]
mod registry {
    use crate::{Hive, RegistryView};
    use winreg::RegKey;
    use winreg::enums::{
        HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WOW64_32KEY, KEY_WOW64_64KEY,
    };

    fn open(hive: Hive, key: &str, view: RegistryView) -> Option<RegKey> {
        let root = match hive {
            Hive::LocalMachine => RegKey::predef(HKEY_LOCAL_MACHINE),
            Hive::CurrentUser => RegKey::predef(HKEY_CURRENT_USER),
        };
        let flags = match view {
            RegistryView::Default => KEY_READ,
            RegistryView::Registry64 => KEY_READ | KEY_WOW64_64KEY,
            RegistryView::Registry32 => KEY_READ | KEY_WOW64_32KEY,
        };
        root.open_subkey_with_flags(key, flags).ok()
    }

    pub fn read_string(hive: Hive, key: &str, value: &str, view: RegistryView) -> Option<String> {
        let key = open(hive, key, view)?;
        if let Ok(text) = key.get_value::<String, _>(value) {
            return Some(text);
        }
        key.get_value::<u32, _>(value).ok().map(|n| n.to_string())
    }

    pub fn subkeys(hive: Hive, key: &str, view: RegistryView) -> Vec<String> {
        match open(hive, key, view) {
            Some(key) => key.enum_keys().filter_map(Result::ok).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(not(windows))]
mod registry {
    use crate::{Hive, RegistryView};

    pub fn read_string(
        _hive: Hive,
        _key: &str,
        _value: &str,
        _view: RegistryView,
    ) -> Option<String> {
        None
    }

    pub fn subkeys(_hive: Hive, _key: &str, _view: RegistryView) -> Vec<String> {
        Vec::new()
    }
}
