//! Per-launcher merge of a fresh detection into stored records
//!
//! Planning is pure: [`plan_merge`] compares what a probe reported with what the library
//! holds for that launcher and returns the inserts, updates and deletes that bring the
//! two in line. The repository applies a plan in one transaction.

use crate::dedup::normalize_executable;
use crate::models::{GameRecord, path_string};
use chrono::{DateTime, Utc};
use gamevault_detect::{DetectedGame, LauncherKind};
use std::collections::{HashMap, HashSet};

/// Changes for one launcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub launcher: LauncherKind,
    /// New records, `id` unset
    pub inserts: Vec<GameRecord>,
    /// Existing records with changed fields
    pub updates: Vec<GameRecord>,
    /// Ids of records no longer reported
    pub deletes: Vec<i64>,
}

impl MergePlan {
    pub fn new(launcher: LauncherKind) -> Self {
        Self {
            launcher,
            inserts: Vec::new(),
            updates: Vec::new(),
            deletes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// Ids touched by an applied plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedMerge {
    /// Ids of inserted records, in plan order
    pub inserted: Vec<i64>,
    pub updated: Vec<i64>,
    pub deleted: usize,
}

/// Compute the changes that make `existing` match `detected`
///
/// `existing` must hold every stored record of `launcher`. Records are only
/// pruned when `complete` says the probe read all of its data.
pub fn plan_merge(
    launcher: LauncherKind,
    existing: &[GameRecord],
    detected: &[DetectedGame],
    complete: bool,
    now: DateTime<Utc>,
) -> MergePlan {
    let mut plan = MergePlan::new(launcher);

    let by_external_id: HashMap<&str, &GameRecord> = existing
        .iter()
        .filter_map(|record| record.join_key().map(|key| (key, record)))
        .collect();
    let mut known_executables: HashSet<String> = existing
        .iter()
        .filter_map(|record| record.executable_path.as_deref())
        .filter_map(normalize_executable)
        .collect();
    let mut seen = HashSet::new();

    for game in detected {
        if game.name.trim().is_empty() {
            tracing::debug!("Skipping unnamed {} game", launcher.key());
            continue;
        }

        match game.join_key() {
            Some(key) => {
                if !seen.insert(key.to_string()) {
                    tracing::debug!("Duplicate {} id {} in one scan", launcher.key(), key);
                    continue;
                }
                match by_external_id.get(key) {
                    Some(record) => {
                        let updated = refreshed(record, game);
                        if updated != **record {
                            plan.updates.push(updated);
                        }
                    }
                    None => plan.inserts.push(new_record(launcher, game, now)),
                }
            }
            None => {
                // Without a vendor id the executable is the only identity we have
                let Some(exe) = game
                    .executable_path
                    .as_deref()
                    .and_then(|path| normalize_executable(&path.to_string_lossy()))
                else {
                    tracing::debug!("Skipping {} game {} with no id or executable", launcher.key(), game.name);
                    continue;
                };
                if known_executables.insert(exe) {
                    plan.inserts.push(new_record(launcher, game, now));
                }
            }
        }
    }

    if launcher.is_probed() && complete {
        plan.deletes = existing
            .iter()
            .filter(|record| record.launcher == launcher)
            .filter(|record| record.join_key().is_some_and(|key| !seen.contains(key)))
            .map(|record| record.id)
            .collect();
    }

    plan
}

fn new_record(launcher: LauncherKind, game: &DetectedGame, now: DateTime<Utc>) -> GameRecord {
    let mut record = GameRecord::new(launcher, game.name.trim(), now);
    record.external_id = game.join_key().map(str::to_string);
    record.install_path = game.install_path.as_deref().map(path_string);
    record.executable_path = game.executable_path.as_deref().map(path_string);
    record.launch_command = game.launch_command.clone();
    record.icon_path = game.icon_hint.as_deref().map(path_string);
    record
}

/// `record` with the detected fields written over it
fn refreshed(record: &GameRecord, game: &DetectedGame) -> GameRecord {
    let mut updated = record.clone();
    updated.name = game.name.trim().to_string();
    updated.install_path = game.install_path.as_deref().map(path_string);
    updated.executable_path = game.executable_path.as_deref().map(path_string);
    updated.launch_command = game.launch_command.clone();
    if let Some(hint) = &game.icon_hint {
        updated.icon_path = Some(path_string(hint));
    }
    updated
}
