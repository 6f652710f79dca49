//! Separator-agnostic path helpers
//!
//! Vendor data mixes `\` and `/` freely, and Windows paths are case-insensitive.
//! These helpers compare paths the way Windows would regardless of the host.

use regex::Regex;
use std::path::Path;

/// Normalized comparison key: lowercase, `/` separators, no trailing separator
pub fn path_key(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut key = String::with_capacity(raw.len());
    let mut last_sep = false;
    for ch in raw.chars() {
        if ch == '/' {
            if !last_sep {
                key.push('/');
            }
            last_sep = true;
        } else {
            key.extend(ch.to_lowercase());
            last_sep = false;
        }
    }
    while key.len() > 1 && key.ends_with('/') {
        key.pop();
    }
    key
}

/// Last path component, splitting on both separators
pub fn file_name_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed)
}

/// Last path component without its extension
pub fn file_stem_of(path: &str) -> &str {
    let name = file_name_of(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// Whether `path` equals `root` or lies beneath it
pub fn is_under(path: &Path, root: &Path) -> bool {
    let path = path_key(path);
    let root = path_key(root);
    if root.is_empty() {
        return false;
    }
    path == root || path.starts_with(&format!("{}/", root.trim_end_matches('/')))
}

/// Compile a filename glob (`*`, `?`) into a case-insensitive matcher
pub fn glob_matcher(pattern: &str) -> Option<Regex> {
    if pattern.is_empty() {
        return None;
    }

    let mut expr = String::from("(?i)^");
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr).ok()
}
