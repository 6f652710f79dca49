//! Built-in launcher probes

mod battlenet;
mod ea;
mod epic;
mod gog;
mod minecraft;
mod riot;
mod roblox;
mod rockstar;
mod steam;
mod ubisoft;

pub use battlenet::BattleNetProbe;
pub use ea::EaProbe;
pub use epic::EpicProbe;
pub use gog::GogProbe;
pub use minecraft::MinecraftProbe;
pub use riot::RiotProbe;
pub use roblox::RobloxProbe;
pub use rockstar::RockstarProbe;
pub use steam::SteamProbe;
pub use ubisoft::UbisoftProbe;

use crate::helpers::{self, DefaultPath, HeuristicWalk};
use crate::{DetectedGame, DetectionResult, InstallLocation, LauncherKind, LauncherProbe, ProbeContext, ProbeIssue};

/// One probe per probed launcher, in stable order
pub fn default_probes(ctx: &ProbeContext) -> Vec<Box<dyn LauncherProbe>> {
    vec![
        Box::new(SteamProbe::new(ctx.clone())),
        Box::new(EpicProbe::new(ctx.clone())),
        Box::new(EaProbe::new(ctx.clone())),
        Box::new(UbisoftProbe::new(ctx.clone())),
        Box::new(GogProbe::new(ctx.clone())),
        Box::new(BattleNetProbe::new(ctx.clone())),
        Box::new(RockstarProbe::new(ctx.clone())),
        Box::new(RiotProbe::new(ctx.clone())),
        Box::new(MinecraftProbe::new(ctx.clone())),
        Box::new(RobloxProbe::new(ctx.clone())),
    ]
}

fn not_installed(kind: LauncherKind) -> DetectionResult {
    tracing::debug!("{} not installed", kind);
    DetectionResult::not_installed(kind, format!("{} not found", kind))
}

/// Wrap a finished probe run, logging the summary and each skipped candidate
fn finish(
    kind: LauncherKind,
    location: InstallLocation,
    games: Vec<DetectedGame>,
    issues: Vec<ProbeIssue>,
) -> DetectionResult {
    for issue in &issues {
        match issue {
            ProbeIssue::ParseFailure { .. } => tracing::warn!("{}: {}", kind, issue),
            _ => tracing::debug!("{}: {}", kind, issue),
        }
    }

    tracing::info!(
        "{} at {}: {} game(s), {} skipped",
        kind,
        location,
        games.len(),
        issues.len()
    );

    DetectionResult::installed(kind, location, games, issues)
}

/// Folders found by the bounded heuristic walk
fn heuristic_dirs(ctx: &ProbeContext, defaults: &[DefaultPath], markers: &[&str]) -> HeuristicWalk {
    let system = ctx.system.as_ref();
    let roots = helpers::heuristic_roots(
        system,
        defaults,
        &ctx.settings.extra_roots,
        ctx.settings.drive_scan,
    );
    if roots.is_empty() {
        return HeuristicWalk {
            dirs: Vec::new(),
            complete: true,
        };
    }

    let walk = helpers::heuristic_scan(system, &roots, markers, &ctx.settings.budget());
    tracing::debug!(
        "Heuristic scan for {:?} over {} root(s) found {} folder(s)",
        markers,
        roots.len(),
        walk.dirs.len()
    );
    if !walk.complete {
        tracing::warn!("Heuristic scan for {:?} stopped before finishing", markers);
    }
    walk
}

/// A missing data source means the launcher's games could not be listed, not that it has none
fn data_missing(kind: LauncherKind, location: InstallLocation, what: &str) -> DetectionResult {
    let issues = vec![ProbeIssue::DataUnavailable(format!("{} missing", what))];
    finish(kind, location, Vec::new(), issues).partial(format!("{} missing", what))
}

/// Quote a path for a command-line directive
fn quoted(path: &std::path::Path) -> String {
    format!("\"{}\"", path.display())
}
