//! Allow-list of protocol schemes and deny-list of interpreters

use gamevault_platform::file_name_of;
use std::collections::BTreeSet;

/// Protocol schemes registered by supported launchers
pub const DEFAULT_URI_SCHEMES: &[&str] = &[
    "steam",
    "com.epicgames.launcher",
    "origin",
    "origin2",
    "eadm",
    "uplay",
    "goggalaxy",
    "battlenet",
    "blizzard",
    "rockstar",
    "riotclient",
    "minecraft",
    "roblox",
    "roblox-player",
];

/// Shells and script hosts that must never be started from a stored command
pub const DEFAULT_DENIED_INTERPRETERS: &[&str] = &[
    "cmd",
    "powershell",
    "pwsh",
    "wscript",
    "cscript",
    "mshta",
    "bash",
    "sh",
    "wsl",
    "rundll32",
    "regsvr32",
    "python",
    "pythonw",
    "node",
    "conhost",
    "msiexec",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPolicy {
    allowed_schemes: BTreeSet<String>,
    denied_interpreters: BTreeSet<String>,
}

impl Default for LaunchPolicy {
    fn default() -> Self {
        Self {
            allowed_schemes: DEFAULT_URI_SCHEMES.iter().map(|s| s.to_string()).collect(),
            denied_interpreters: DEFAULT_DENIED_INTERPRETERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl LaunchPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow additional schemes (matched case-insensitively, trailing `:` or `://` ignored)
    pub fn with_extra_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for scheme in schemes {
            let scheme = scheme.as_ref().trim().trim_end_matches("://").trim_end_matches(':');
            if !scheme.is_empty() {
                self.allowed_schemes.insert(scheme.to_lowercase());
            }
        }
        self
    }

    /// Deny additional executables by name (extension optional)
    pub fn with_extra_denied<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = interpreter_key(name.as_ref());
            if !name.is_empty() {
                self.denied_interpreters.insert(name);
            }
        }
        self
    }

    pub fn is_allowed_scheme(&self, scheme: &str) -> bool {
        self.allowed_schemes.contains(&scheme.to_lowercase())
    }

    /// Whether the file name of `path` is a denied interpreter
    pub fn is_denied_interpreter(&self, path: &str) -> bool {
        let key = interpreter_key(path);
        !key.is_empty() && self.denied_interpreters.contains(&key)
    }

    pub fn allowed_schemes(&self) -> impl Iterator<Item = &str> {
        self.allowed_schemes.iter().map(String::as_str)
    }
}

/// Lowercased file name without a trailing extension
fn interpreter_key(path: &str) -> String {
    let name = file_name_of(path.trim().trim_matches('"')).to_lowercase();
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[..idx].to_string(),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schemes() {
        let policy = LaunchPolicy::new();
        assert!(policy.is_allowed_scheme("steam"));
        assert!(policy.is_allowed_scheme("STEAM"));
        assert!(policy.is_allowed_scheme("com.epicgames.launcher"));
        assert!(!policy.is_allowed_scheme("file"));
        assert!(!policy.is_allowed_scheme("shell"));
    }

    #[test]
    fn test_interpreters_with_and_without_extension() {
        let policy = LaunchPolicy::new();
        assert!(policy.is_denied_interpreter("cmd"));
        assert!(policy.is_denied_interpreter("CMD.EXE"));
        assert!(policy.is_denied_interpreter(r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe"));
        assert!(policy.is_denied_interpreter("/usr/bin/bash"));
        assert!(!policy.is_denied_interpreter(r"D:\Games\Hades\Hades.exe"));
        assert!(!policy.is_denied_interpreter("command.exe"));
    }

    #[test]
    fn test_extras() {
        let policy = LaunchPolicy::new()
            .with_extra_schemes(["heroic://", "Itch:", " "])
            .with_extra_denied(["autohotkey.exe", ""]);

        assert!(policy.is_allowed_scheme("heroic"));
        assert!(policy.is_allowed_scheme("itch"));
        assert!(!policy.is_allowed_scheme(""));
        assert!(policy.is_denied_interpreter(r"C:\Tools\AutoHotkey.exe"));
        assert!(policy.is_denied_interpreter("autohotkey"));
    }
}
