//! Probe registry

use crate::probes;
use crate::{LauncherKind, LauncherProbe, ProbeContext};
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// One probe per launcher, built once and shared for the process lifetime
pub struct ProbeRegistry {
    probes: BTreeMap<LauncherKind, Box<dyn LauncherProbe>>,
}

impl ProbeRegistry {
    /// Registry without any probes
    pub fn empty() -> Self {
        Self {
            probes: BTreeMap::new(),
        }
    }

    /// Registry holding the built-in probe for every probed launcher
    pub fn with_default_probes(ctx: ProbeContext) -> Self {
        let mut registry = Self::empty();
        for probe in probes::default_probes(&ctx) {
            registry.register(probe);
        }
        registry
    }

    /// Add or replace the probe for its launcher
    pub fn register(&mut self, probe: Box<dyn LauncherProbe>) {
        let kind = probe.launcher();
        if !kind.is_probed() {
            tracing::warn!("Ignoring probe registered for {}", kind);
            return;
        }
        self.probes.insert(kind, probe);
    }

    pub fn get(&self, kind: LauncherKind) -> Option<&dyn LauncherProbe> {
        self.probes.get(&kind).map(|probe| probe.as_ref())
    }

    /// Probes in stable launcher order
    pub fn iter(&self) -> impl Iterator<Item = &dyn LauncherProbe> {
        self.probes.values().map(|probe| probe.as_ref())
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Installed state of every registered launcher.
    ///
    /// A probe that panics reads as not installed and does not affect the others.
    pub fn detect_installed(&self) -> BTreeMap<LauncherKind, bool> {
        self.probes
            .iter()
            .map(|(kind, probe)| {
                let installed = catch_unwind(AssertUnwindSafe(|| probe.probe_installed()))
                    .unwrap_or_else(|_| {
                        tracing::warn!("{} probe panicked while checking install state", kind);
                        false
                    });
                (*kind, installed)
            })
            .collect()
    }
}

impl Default for ProbeRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DetectionResult, InstallLocation};
    use gamevault_platform::mock::MemorySystem;
    use std::path::PathBuf;
    use std::sync::Arc;

    struct PanickingProbe;

    impl LauncherProbe for PanickingProbe {
        fn launcher(&self) -> LauncherKind {
            LauncherKind::Roblox
        }

        fn resolve_install_path(&self) -> Option<InstallLocation> {
            panic!("corrupt vendor data");
        }

        fn detect_games(&self) -> DetectionResult {
            panic!("corrupt vendor data");
        }
    }

    struct FixedProbe(LauncherKind);

    impl LauncherProbe for FixedProbe {
        fn launcher(&self) -> LauncherKind {
            self.0
        }

        fn resolve_install_path(&self) -> Option<InstallLocation> {
            Some(InstallLocation::Path(PathBuf::from(r"C:\Fixed")))
        }

        fn detect_games(&self) -> DetectionResult {
            DetectionResult::not_installed(self.0, "fixed")
        }
    }

    #[test]
    fn test_default_registry_covers_every_probed_launcher() {
        let ctx = ProbeContext::new(Arc::new(MemorySystem::windows_layout()));
        let registry = ProbeRegistry::with_default_probes(ctx);

        assert_eq!(registry.len(), 10);
        assert!(registry.get(LauncherKind::Manual).is_none());
        let order: Vec<LauncherKind> = registry.iter().map(|p| p.launcher()).collect();
        let expected: Vec<LauncherKind> = LauncherKind::probed().collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn test_detect_installed_survives_panics() {
        let mut registry = ProbeRegistry::empty();
        registry.register(Box::new(PanickingProbe));
        registry.register(Box::new(FixedProbe(LauncherKind::Steam)));

        let states = registry.detect_installed();
        assert_eq!(states.get(&LauncherKind::Roblox), Some(&false));
        assert_eq!(states.get(&LauncherKind::Steam), Some(&true));
    }

    #[test]
    fn test_manual_probe_is_rejected() {
        let mut registry = ProbeRegistry::empty();
        registry.register(Box::new(FixedProbe(LauncherKind::Manual)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_nothing_installed_on_empty_machine() {
        let ctx = ProbeContext::new(Arc::new(MemorySystem::windows_layout()));
        let registry = ProbeRegistry::with_default_probes(ctx);
        assert!(registry.detect_installed().values().all(|installed| !installed));
    }
}
