//! Shared probe building blocks
//!
//! Registry lookups, default-path tables, executable validation and the
//! heuristic folder walk. Every probe applies the same rules through these
//! functions so a candidate is judged identically whichever launcher found it.

use crate::ProbeIssue;
use gamevault_platform::{
    Hive, KnownFolder, RegistryView, ScanBudget, SystemAccess, file_stem_of, path_key,
};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Executable names that are never the game itself (case-insensitive substrings)
pub const UTILITY_EXE_PATTERNS: &[&str] = &[
    "unins",
    "uninstall",
    "crashhandler",
    "crashreport",
    "crashpad",
    "crash_reporter",
    "bugreport",
    "errorreporter",
    "update",
    "patcher",
    "setup",
    "install",
    "redist",
    "vc_redist",
    "directx",
    "dxsetup",
    "dxwebsetup",
    "dotnet",
    "oalinst",
    "physx",
    "prereq",
    "easyanticheat",
    "eac_launcher",
    "battleye",
    "beservice",
    "anticheat",
    "cefsubprocess",
    "cefprocess",
    "helper",
    "touchup",
    "cleanup",
    "overlay",
    "benchmark",
    "configtool",
    "diagnostic",
];

/// Subdirectories where engines commonly put the main binary
pub const COMMON_BINARY_DIRS: &[&str] = &[
    "bin",
    "bin64",
    "binaries",
    "x64",
    "win64",
    "bin/x64",
    "bin/win64",
    "binaries/win64",
    "game",
    "game/bin",
    "game/bin/x64",
    "retail",
    "_retail_",
    "x86_64",
];

/// Top-level folders a drive walk never enters
pub const SYSTEM_FOLDERS: &[&str] = &[
    "windows",
    "$recycle.bin",
    "system volume information",
    "programdata",
    "users",
    "recovery",
    "perflogs",
    "boot",
    "intel",
    "amd",
    "nvidia",
    "msocache",
    "config.msi",
    "$windows.~bt",
    "$windows.~ws",
    "windowsapps",
];

/// Folders inside game installs that only hold support files
pub const NON_GAME_FOLDERS: &[&str] = &[
    "_commonredist",
    "commonredist",
    "redist",
    "redistributables",
    "directx",
    "vcredist",
    "support",
    "__installer",
    "installer",
    "installers",
    "sdk",
    "easyanticheat",
    "battleye",
    "engine",
    "prerequisites",
    "dotnet",
];

/// A registry value worth trying
#[derive(Debug, Clone, Copy)]
pub struct RegistryProbe {
    pub key: &'static str,
    pub value: &'static str,
}

impl RegistryProbe {
    pub const fn new(key: &'static str, value: &'static str) -> Self {
        Self { key, value }
    }
}

/// A default install directory relative to a known folder
pub type DefaultPath = (KnownFolder, &'static str);

/// An executable that passed the utility filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExeCandidate {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

/// Registry locations in lookup order
const LOOKUP_ORDER: [(Hive, RegistryView); 3] = [
    (Hive::LocalMachine, RegistryView::Registry64),
    (Hive::LocalMachine, RegistryView::Registry32),
    (Hive::CurrentUser, RegistryView::Default),
];

/// Read a value trying the 64-bit view, then the 32-bit view, then HKCU
pub fn read_registry_value(system: &dyn SystemAccess, key: &str, value: &str) -> Option<String> {
    LOOKUP_ORDER.iter().find_map(|(hive, view)| {
        system
            .read_registry_string(*hive, key, value, *view)
            .map(|v| v.trim().trim_matches('"').trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// First value found among several registry locations
pub fn registry_lookup(system: &dyn SystemAccess, candidates: &[RegistryProbe]) -> Option<String> {
    candidates
        .iter()
        .find_map(|candidate| read_registry_value(system, candidate.key, candidate.value))
}

/// Subkeys of `key` across HKLM (both views) and HKCU, first spelling wins
pub fn registry_subkeys_all(system: &dyn SystemAccess, key: &str) -> Vec<(Hive, RegistryView, String)> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for (hive, view) in LOOKUP_ORDER {
        for name in system.registry_subkeys(hive, key, view) {
            if seen.insert(name.to_lowercase()) {
                found.push((hive, view, name));
            }
        }
    }
    found
}

/// Turn a registry/config path into an existing directory.
///
/// Values often point at the launcher executable rather than its folder.
pub fn existing_dir(system: &dyn SystemAccess, raw: &str) -> Option<PathBuf> {
    let cleaned = raw.trim().trim_matches('"').trim();
    if cleaned.is_empty() {
        return None;
    }

    let path = PathBuf::from(cleaned);
    if system.is_dir(&path) {
        return Some(path);
    }
    if system.is_file(&path) {
        return parent_of(&path);
    }
    None
}

/// Parent directory that also works for Windows paths on any host
pub fn parent_of(path: &Path) -> Option<PathBuf> {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim_end_matches(['/', '\\']);
    let idx = trimmed.rfind(['/', '\\'])?;
    let parent = &trimmed[..idx];
    if parent.is_empty() {
        return None;
    }
    // Keep "C:" roots usable as directories
    if parent.ends_with(':') {
        return Some(PathBuf::from(format!("{}\\", parent)));
    }
    Some(PathBuf::from(parent))
}

/// Join a `/` or `\` separated relative path onto `base`
pub fn join_relative(base: &Path, relative: &str) -> PathBuf {
    relative
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .fold(base.to_path_buf(), |acc, part| acc.join(part))
}

/// First default directory that exists
pub fn first_existing_default(system: &dyn SystemAccess, defaults: &[DefaultPath]) -> Option<PathBuf> {
    defaults.iter().find_map(|(folder, relative)| {
        let base = system.known_folder(*folder)?;
        let candidate = join_relative(&base, relative);
        system.is_dir(&candidate).then_some(candidate)
    })
}

/// Launcher directory from registry candidates, then default locations
pub fn locate_install_dir(
    system: &dyn SystemAccess,
    registry: &[RegistryProbe],
    defaults: &[DefaultPath],
) -> Option<PathBuf> {
    registry
        .iter()
        .filter_map(|candidate| read_registry_value(system, candidate.key, candidate.value))
        .find_map(|raw| existing_dir(system, strip_icon_index(&raw)))
        .or_else(|| first_existing_default(system, defaults))
}

/// Drop the `,0` resource index registry icon values carry
pub fn strip_icon_index(raw: &str) -> &str {
    let raw = raw.trim();
    match raw.rsplit_once(',') {
        Some((path, index)) if index.trim().parse::<i32>().is_ok() => path.trim().trim_matches('"'),
        _ => raw.trim_matches('"'),
    }
}

/// First capture group of `regex` in `text`, trimmed
pub fn capture_first(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Uninstall entry from `...\CurrentVersion\Uninstall`
#[derive(Debug, Clone, Default)]
pub struct UninstallEntry {
    pub key: String,
    pub display_name: Option<String>,
    pub install_location: Option<String>,
    pub display_icon: Option<String>,
}

pub const UNINSTALL_KEY: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall";

/// All uninstall entries visible in HKLM (both views) and HKCU
pub fn uninstall_entries(system: &dyn SystemAccess) -> Vec<UninstallEntry> {
    registry_subkeys_all(system, UNINSTALL_KEY)
        .into_iter()
        .map(|(hive, view, name)| {
            let key = format!(r"{}\{}", UNINSTALL_KEY, name);
            let read = |value: &str| {
                system
                    .read_registry_string(hive, &key, value, view)
                    .map(|v| v.trim().trim_matches('"').to_string())
                    .filter(|v| !v.is_empty())
            };
            UninstallEntry {
                display_name: read("DisplayName"),
                install_location: read("InstallLocation"),
                display_icon: read("DisplayIcon"),
                key: name,
            }
        })
        .collect()
}

/// Uninstall entry by exact subkey name
pub fn uninstall_entry(system: &dyn SystemAccess, subkey: &str) -> Option<UninstallEntry> {
    let key = format!(r"{}\{}", UNINSTALL_KEY, subkey);
    let display_name = read_registry_value(system, &key, "DisplayName");
    let install_location = read_registry_value(system, &key, "InstallLocation");
    let display_icon = read_registry_value(system, &key, "DisplayIcon");

    if display_name.is_none() && install_location.is_none() && display_icon.is_none() {
        return None;
    }

    Some(UninstallEntry {
        key: subkey.to_string(),
        display_name,
        install_location,
        display_icon,
    })
}

/// Whether an executable name looks like a utility rather than the game
pub fn is_utility_executable(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    UTILITY_EXE_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

fn is_executable_name(name: &str) -> bool {
    name.to_lowercase().ends_with(".exe")
}

pub fn is_system_folder(name: &str) -> bool {
    let lower = name.to_lowercase();
    SYSTEM_FOLDERS.contains(&lower.as_str())
}

pub fn is_non_game_folder(name: &str) -> bool {
    let lower = name.to_lowercase();
    NON_GAME_FOLDERS.contains(&lower.as_str())
}

fn collect_executables(
    system: &dyn SystemAccess,
    dir: &Path,
    seen: &mut HashSet<String>,
    out: &mut Vec<ExeCandidate>,
) {
    let Ok(entries) = system.list_dir(dir) else {
        return;
    };

    for entry in entries {
        if entry.is_dir || !is_executable_name(&entry.name) || is_utility_executable(&entry.name) {
            continue;
        }
        if seen.insert(path_key(&entry.path)) {
            out.push(ExeCandidate {
                path: entry.path,
                name: entry.name,
                size: entry.size,
            });
        }
    }
}

fn child_dirs(system: &dyn SystemAccess, dir: &Path) -> Vec<PathBuf> {
    system
        .list_dir(dir)
        .unwrap_or_default()
        .into_iter()
        .filter(|entry| entry.is_dir && !is_non_game_folder(&entry.name))
        .map(|entry| entry.path)
        .collect()
}

/// Non-utility executables of an install directory.
///
/// Looks in the directory itself, in [`COMMON_BINARY_DIRS`], one level below
/// each of those, and in `<child>/Binaries/Win64` for Unreal-style layouts.
pub fn find_game_executables(system: &dyn SystemAccess, dir: &Path) -> Vec<ExeCandidate> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    if !system.is_dir(dir) {
        return found;
    }

    collect_executables(system, dir, &mut seen, &mut found);

    for relative in COMMON_BINARY_DIRS {
        let sub = join_relative(dir, relative);
        if !system.is_dir(&sub) {
            continue;
        }
        collect_executables(system, &sub, &mut seen, &mut found);
        for nested in child_dirs(system, &sub) {
            collect_executables(system, &nested, &mut seen, &mut found);
        }
    }

    for child in child_dirs(system, dir) {
        for relative in ["binaries/win64", "bin/x64"] {
            let sub = join_relative(&child, relative);
            if system.is_dir(&sub) {
                collect_executables(system, &sub, &mut seen, &mut found);
            }
        }
    }

    found
}

/// A directory is a valid install when it holds at least one game executable
pub fn is_valid_install(system: &dyn SystemAccess, dir: &Path) -> bool {
    !find_game_executables(system, dir).is_empty()
}

/// Validate an install directory and pick its main executable
pub fn validate_install(
    system: &dyn SystemAccess,
    dir: &Path,
    game_name: &str,
) -> Result<PathBuf, ProbeIssue> {
    if !system.is_dir(dir) {
        return Err(ProbeIssue::rejected(
            game_name,
            format!("install directory {} does not exist", dir.display()),
        ));
    }

    let candidates = find_game_executables(system, dir);
    select_main_executable(&candidates, game_name).ok_or_else(|| {
        ProbeIssue::rejected(
            game_name,
            format!("no game executable in {}", dir.display()),
        )
    })
}

fn normalize_for_match(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn name_score(exe_name: &str, game_name: &str) -> (u8, usize) {
    let exe = normalize_for_match(file_stem_of(exe_name));
    let game = normalize_for_match(game_name);
    if exe.is_empty() || game.is_empty() {
        return (0, 0);
    }
    if exe == game {
        return (3, exe.len());
    }
    if game.contains(&exe) || exe.contains(&game) {
        return (2, exe.len().min(game.len()));
    }
    let prefix = exe
        .chars()
        .zip(game.chars())
        .take_while(|(a, b)| a == b)
        .count();
    if prefix >= 3 { (1, prefix) } else { (0, 0) }
}

/// Pick the executable whose name best matches the game, then the largest
pub fn select_main_executable(candidates: &[ExeCandidate], game_name: &str) -> Option<PathBuf> {
    candidates
        .iter()
        .max_by(|a, b| {
            let score_a = name_score(&a.name, game_name);
            let score_b = name_score(&b.name, game_name);
            score_a
                .cmp(&score_b)
                .then(a.size.cmp(&b.size))
                // Stable choice among equals: earlier listing wins
                .then(b.path.cmp(&a.path))
        })
        .map(|candidate| candidate.path.clone())
}

/// Strip trademark glyphs and collapse whitespace in a display name
pub fn clean_title(name: &str) -> String {
    let mut clean = name.replace(['™', '®', '©'], " ");

    for pattern in ["(TM)", "(tm)", "(R)", "(r)"] {
        clean = clean.replace(pattern, " ");
    }

    clean.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Roots for a heuristic walk: configured extras, default roots, then drives
pub fn heuristic_roots(
    system: &dyn SystemAccess,
    defaults: &[DefaultPath],
    extra_roots: &[PathBuf],
    include_drives: bool,
) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut roots = Vec::new();

    let defaults = defaults.iter().filter_map(|(folder, relative)| {
        system
            .known_folder(*folder)
            .map(|base| join_relative(&base, relative))
    });

    let drives = if include_drives {
        system.fixed_drives()
    } else {
        Vec::new()
    };

    for root in extra_roots.iter().cloned().chain(defaults).chain(drives) {
        if system.is_dir(&root) && seen.insert(path_key(&root)) {
            roots.push(root);
        }
    }
    roots
}

/// Folders matched by [`heuristic_scan`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeuristicWalk {
    pub dirs: Vec<PathBuf>,
    /// False when the deadline or cancel flag stopped the walk before its queue drained
    pub complete: bool,
}

/// Walk `roots` breadth-first looking for folders that contain every marker
/// file and a game executable.
///
/// Matched folders are not descended into. System folders, support folders
/// and hidden folders are skipped. Stops early once the budget is exhausted.
pub fn heuristic_scan(
    system: &dyn SystemAccess,
    roots: &[PathBuf],
    markers: &[&str],
    budget: &ScanBudget,
) -> HeuristicWalk {
    let mut found = Vec::new();
    let mut complete = true;
    let mut seen = HashSet::new();
    let mut queue: std::collections::VecDeque<(PathBuf, usize)> =
        roots.iter().map(|root| (root.clone(), 0)).collect();

    while let Some((dir, depth)) = queue.pop_front() {
        if budget.is_exhausted() {
            tracing::debug!("Heuristic scan stopped early, budget exhausted");
            complete = false;
            break;
        }
        if !seen.insert(path_key(&dir)) {
            continue;
        }

        let has_markers = !markers.is_empty()
            && markers
                .iter()
                .all(|marker| system.exists(&join_relative(&dir, marker)));
        if has_markers && is_valid_install(system, &dir) {
            found.push(dir);
            continue;
        }

        if depth >= budget.max_depth {
            continue;
        }

        let Ok(entries) = system.list_dir(&dir) else {
            continue;
        };
        for entry in entries {
            if !entry.is_dir
                || entry.name.starts_with('.')
                || entry.name.starts_with('$')
                || is_system_folder(&entry.name)
                || is_non_game_folder(&entry.name)
            {
                continue;
            }
            queue.push_back((entry.path, depth + 1));
        }
    }

    HeuristicWalk { dirs: found, complete }
}

/// Last component of a directory, used as a fallback title
pub fn folder_title(dir: &Path) -> String {
    clean_title(gamevault_platform::file_name_of(&dir.to_string_lossy()))
}
