//! Cross-launcher duplicate removal
//!
//! The same install can be reported by two launchers (a Steam copy of an EA game, for
//! instance). Records sharing an executable are grouped and one survivor is kept per
//! group.

use crate::models::GameRecord;
use gamevault_detect::LauncherKind;
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Grouping key for an executable path: trimmed, lowercase, `\` separators
pub fn normalize_executable(path: &str) -> Option<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.replace('/', "\\").to_lowercase())
}

/// Parse configured launcher keys, dropping unknown and repeated ones
pub fn parse_launchers<S: AsRef<str>>(keys: &[S]) -> Vec<LauncherKind> {
    let mut priority = Vec::new();
    for key in keys {
        match key.as_ref().parse::<LauncherKind>() {
            Ok(kind) if !priority.contains(&kind) => priority.push(kind),
            Ok(_) => {}
            Err(e) => tracing::warn!("Ignoring configured launcher: {}", e),
        }
    }
    priority
}

/// Ids to delete so that no two records share an executable
///
/// Survivor per group: the launcher listed earliest in `priority`, then the most
/// recently added, then the highest id. Manually added games are left alone.
pub fn plan_dedup(records: &[GameRecord], priority: &[LauncherKind]) -> Vec<i64> {
    let mut groups: BTreeMap<String, Vec<&GameRecord>> = BTreeMap::new();
    for record in records {
        if record.launcher == LauncherKind::Manual {
            continue;
        }
        if let Some(key) = record.executable_path.as_deref().and_then(normalize_executable) {
            groups.entry(key).or_default().push(record);
        }
    }

    let rank = |launcher: LauncherKind| {
        priority
            .iter()
            .position(|kind| *kind == launcher)
            .unwrap_or(usize::MAX)
    };

    let mut deletes: Vec<i64> = groups
        .into_values()
        .filter(|group| group.len() > 1)
        .flat_map(|group| {
            let keep = group
                .iter()
                .min_by_key(|record| (rank(record.launcher), Reverse(record.date_added), Reverse(record.id)))
                .map(|record| record.id);
            group
                .into_iter()
                .map(|record| record.id)
                .filter(move |id| Some(*id) != keep)
        })
        .collect();

    deletes.sort_unstable();
    deletes
}
