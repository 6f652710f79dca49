//! In-memory registry and filesystem for testing
//!
//! Paths are compared the way Windows compares them (case-insensitive, either
//! separator), so fixtures can use literal Windows paths on any host.
//!
//! # Usage
//!
//! ```
//! use gamevault_platform::mock::MemorySystem;
//! use gamevault_platform::{Hive, RegistryView, SystemAccess};
//!
//! let system = MemorySystem::windows_layout()
//!     .with_registry_value(
//!         Hive::LocalMachine,
//!         RegistryView::Registry32,
//!         r"SOFTWARE\Valve\Steam",
//!         "InstallPath",
//!         r"C:\Program Files (x86)\Steam",
//!     )
//!     .with_file(r"C:\Program Files (x86)\Steam\steam.exe", "MZ");
//!
//! assert!(system.is_file(std::path::Path::new(r"c:/program files (x86)/steam/STEAM.EXE")));
//! ```

use crate::{DirEntry, Hive, KnownFolder, RegistryView, SystemAccess, path_key};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File { data: Vec<u8>, size: u64 },
}

#[derive(Debug, Clone)]
struct StoredNode {
    name: String,
    node: Node,
}

type RegistryKey = (Hive, RegistryView, String);

#[derive(Debug, Default)]
struct MemoryState {
    nodes: BTreeMap<String, StoredNode>,
    registry: BTreeMap<RegistryKey, BTreeMap<String, String>>,
    registry_names: BTreeMap<String, String>,
    folders: BTreeMap<KnownFolder, PathBuf>,
    drives: Vec<PathBuf>,
}

/// Fake [`SystemAccess`] holding registry keys and files in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySystem {
    state: Arc<RwLock<MemoryState>>,
}

fn split_components(path: &str) -> Vec<&str> {
    path.split(['/', '\\']).filter(|part| !part.is_empty()).collect()
}

fn registry_key(key: &str) -> String {
    split_components(key).join("\\").to_lowercase()
}

impl MemorySystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty machine with the usual Windows folder layout and a `C:` drive
    pub fn windows_layout() -> Self {
        Self::new()
            .with_known_folder(KnownFolder::ProgramFiles, r"C:\Program Files")
            .with_known_folder(KnownFolder::ProgramFilesX86, r"C:\Program Files (x86)")
            .with_known_folder(KnownFolder::ProgramData, r"C:\ProgramData")
            .with_known_folder(KnownFolder::LocalAppData, r"C:\Users\player\AppData\Local")
            .with_known_folder(KnownFolder::RoamingAppData, r"C:\Users\player\AppData\Roaming")
            .with_known_folder(KnownFolder::UserProfile, r"C:\Users\player")
            .with_known_folder(KnownFolder::SystemRoot, r"C:\Windows")
            .with_known_folder(KnownFolder::System, r"C:\Windows\System32")
            .with_drive(r"C:\")
    }

    pub fn with_file(self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Self {
        self.add_file(path, contents);
        self
    }

    /// File whose reported size differs from its contents (for executable ranking)
    pub fn with_sized_file(self, path: impl AsRef<Path>, size: u64) -> Self {
        self.insert(path.as_ref(), Node::File { data: Vec::new(), size });
        self
    }

    pub fn with_dir(self, path: impl AsRef<Path>) -> Self {
        self.add_dir(path);
        self
    }

    pub fn with_registry_value(
        self,
        hive: Hive,
        view: RegistryView,
        key: &str,
        name: &str,
        value: &str,
    ) -> Self {
        self.set_registry_value(hive, view, key, name, value);
        self
    }

    pub fn with_known_folder(self, folder: KnownFolder, path: impl Into<PathBuf>) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.folders.insert(folder, path.into());
        }
        self
    }

    pub fn with_drive(self, root: impl Into<PathBuf>) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.drives.push(root.into());
        }
        self
    }

    pub fn add_file(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) {
        let data = contents.as_ref().to_vec();
        let size = data.len() as u64;
        self.insert(path.as_ref(), Node::File { data, size });
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.insert(path.as_ref(), Node::Dir);
    }

    /// Remove a file or a directory tree
    pub fn remove(&self, path: impl AsRef<Path>) {
        let key = path_key(path.as_ref());
        let prefix = format!("{}/", key);
        if let Ok(mut state) = self.state.write() {
            state
                .nodes
                .retain(|existing, _| existing != &key && !existing.starts_with(&prefix));
        }
    }

    pub fn set_registry_value(
        &self,
        hive: Hive,
        view: RegistryView,
        key: &str,
        name: &str,
        value: &str,
    ) {
        let normalized = registry_key(key);
        if let Ok(mut state) = self.state.write() {
            state
                .registry_names
                .insert(normalized.clone(), split_components(key).join("\\"));
            state
                .registry
                .entry((hive, view, normalized))
                .or_default()
                .insert(name.to_lowercase(), value.to_string());
        }
    }

    pub fn remove_registry_key(&self, hive: Hive, key: &str) {
        let normalized = registry_key(key);
        let prefix = format!("{}\\", normalized);
        if let Ok(mut state) = self.state.write() {
            state.registry.retain(|(h, _, existing), _| {
                *h != hive || (existing != &normalized && !existing.starts_with(&prefix))
            });
        }
    }

    fn insert(&self, path: &Path, node: Node) {
        let raw = path.to_string_lossy().to_string();
        let components = split_components(&raw);
        let Ok(mut state) = self.state.write() else {
            return;
        };

        let mut key = if raw.starts_with(['/', '\\']) {
            String::from("/")
        } else {
            String::new()
        };
        for (idx, component) in components.iter().enumerate() {
            if !key.is_empty() && !key.ends_with('/') {
                key.push('/');
            }
            key.push_str(&component.to_lowercase());

            if idx + 1 == components.len() {
                state.nodes.insert(
                    key.clone(),
                    StoredNode {
                        name: component.to_string(),
                        node: node.clone(),
                    },
                );
            } else {
                state.nodes.entry(key.clone()).or_insert_with(|| StoredNode {
                    name: component.to_string(),
                    node: Node::Dir,
                });
            }
        }
    }

    fn lookup(&self, path: &Path) -> Option<StoredNode> {
        let key = path_key(path);
        self.state.read().ok()?.nodes.get(&key).cloned()
    }

    fn registry_values(
        &self,
        hive: Hive,
        key: &str,
        view: RegistryView,
    ) -> Option<BTreeMap<String, String>> {
        let normalized = registry_key(key);
        let state = self.state.read().ok()?;
        state
            .registry
            .get(&(hive, view, normalized.clone()))
            .or_else(|| state.registry.get(&(hive, RegistryView::Default, normalized)))
            .cloned()
    }
}

impl SystemAccess for MemorySystem {
    fn read_registry_string(
        &self,
        hive: Hive,
        key: &str,
        value: &str,
        view: RegistryView,
    ) -> Option<String> {
        self.registry_values(hive, key, view)?
            .get(&value.to_lowercase())
            .cloned()
    }

    fn registry_subkeys(&self, hive: Hive, key: &str, view: RegistryView) -> Vec<String> {
        let normalized = registry_key(key);
        let prefix = format!("{}\\", normalized);
        let Ok(state) = self.state.read() else {
            return Vec::new();
        };

        let mut children = BTreeSet::new();
        for (h, v, existing) in state.registry.keys() {
            if *h != hive || (*v != view && *v != RegistryView::Default) {
                continue;
            }
            let Some(rest) = existing.strip_prefix(&prefix) else {
                continue;
            };
            let child_len = rest.split('\\').next().unwrap_or(rest).len();
            let child_key = &existing[..prefix.len() + child_len];
            // Keep the original casing the fixture registered the key with
            let child = state
                .registry_names
                .get(existing)
                .map(|original| {
                    let parts: Vec<&str> = original.split('\\').collect();
                    let index = child_key.split('\\').count() - 1;
                    parts.get(index).map(|p| p.to_string()).unwrap_or_default()
                })
                .unwrap_or_else(|| rest[..child_len].to_string());
            children.insert(child);
        }

        children.into_iter().collect()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read_bytes(path)?;
        Ok(String::from_utf8_lossy(&bytes).to_string())
    }

    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.lookup(path) {
            Some(StoredNode {
                node: Node::File { data, .. },
                ..
            }) => Ok(data),
            Some(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.lookup(path).is_some()
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lookup(path), Some(StoredNode { node: Node::Dir, .. }))
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(
            self.lookup(path),
            Some(StoredNode {
                node: Node::File { .. },
                ..
            })
        )
    }

    fn file_size(&self, path: &Path) -> Option<u64> {
        match self.lookup(path)?.node {
            Node::File { size, .. } => Some(size),
            Node::Dir => None,
        }
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        if !self.is_dir(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", path.display()),
            ));
        }

        let prefix = format!("{}/", path_key(path));
        let state = self
            .state
            .read()
            .map_err(|_| io::Error::other("memory system lock poisoned"))?;

        let entries = state
            .nodes
            .iter()
            .filter(|(key, _)| {
                key.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .map(|(_, stored)| {
                let (is_dir, size) = match &stored.node {
                    Node::Dir => (true, 0),
                    Node::File { size, .. } => (false, *size),
                };
                DirEntry {
                    name: stored.name.clone(),
                    path: path.join(&stored.name),
                    is_dir,
                    size,
                }
            })
            .collect();

        Ok(entries)
    }

    fn known_folder(&self, folder: KnownFolder) -> Option<PathBuf> {
        self.state.read().ok()?.folders.get(&folder).cloned()
    }

    fn fixed_drives(&self) -> Vec<PathBuf> {
        self.state
            .read()
            .map(|state| state.drives.clone())
            .unwrap_or_default()
    }
}
