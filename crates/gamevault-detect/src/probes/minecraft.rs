//! Minecraft Launcher: classic installer or Store package

use super::{finish, not_installed};
use crate::helpers::{self, DefaultPath, RegistryProbe};
use crate::{DetectedGame, DetectionResult, InstallLocation, LauncherKind, LauncherProbe, ProbeContext, ProbeIssue};
use gamevault_platform::{KnownFolder, SystemAccess};
use std::path::{Path, PathBuf};

const REGISTRY: &[RegistryProbe] = &[RegistryProbe::new(
    r"SOFTWARE\Mojang\InstalledProducts\Minecraft Launcher",
    "InstallLocation",
)];

const DEFAULTS: &[DefaultPath] = &[
    (KnownFolder::ProgramFilesX86, "Minecraft Launcher"),
    (KnownFolder::ProgramFiles, "Minecraft Launcher"),
];

const LAUNCHER_EXE: &str = "MinecraftLauncher.exe";

const STORE_LAUNCHER_PACKAGE: &str = "Packages/Microsoft.4297127D64EC6_8wekyb3d8bbwe";

const STORE_LAUNCHER_APP: &str = r"shell:AppsFolder\Microsoft.4297127D64EC6_8wekyb3d8bbwe!Minecraft";

const BEDROCK_PACKAGE: &str = "Packages/Microsoft.MinecraftUWP_8wekyb3d8bbwe";

pub const JAVA_EDITION_ID: &str = "minecraft-java";

pub const BEDROCK_EDITION_ID: &str = "minecraft-bedrock";

pub struct MinecraftProbe {
    ctx: ProbeContext,
}

impl MinecraftProbe {
    pub fn new(ctx: ProbeContext) -> Self {
        Self { ctx }
    }

    fn system(&self) -> &dyn SystemAccess {
        self.ctx.system.as_ref()
    }

    fn local_package(&self, relative: &str) -> Option<PathBuf> {
        let system = self.system();
        system
            .known_folder(KnownFolder::LocalAppData)
            .map(|local| helpers::join_relative(&local, relative))
            .filter(|dir| system.is_dir(dir))
    }

    fn java_edition(&self, launcher_dir: &Path) -> Result<DetectedGame, ProbeIssue> {
        let exe = launcher_dir.join(LAUNCHER_EXE);
        let executable = if self.system().is_file(&exe) {
            exe
        } else {
            helpers::validate_install(self.system(), launcher_dir, "Minecraft Launcher")?
        };

        Ok(DetectedGame::new("Minecraft: Java Edition")
            .with_external_id(JAVA_EDITION_ID)
            .with_install_path(launcher_dir)
            .with_icon_hint(executable.clone())
            .with_executable(executable))
    }
}

impl LauncherProbe for MinecraftProbe {
    fn launcher(&self) -> LauncherKind {
        LauncherKind::Minecraft
    }

    fn resolve_install_path(&self) -> Option<InstallLocation> {
        helpers::locate_install_dir(self.system(), REGISTRY, DEFAULTS)
            .map(InstallLocation::Path)
            .or_else(|| {
                self.local_package(STORE_LAUNCHER_PACKAGE)
                    .map(|_| InstallLocation::ShellApp(STORE_LAUNCHER_APP.to_string()))
            })
    }

    fn detect_games(&self) -> DetectionResult {
        let Some(location) = self.resolve_install_path() else {
            return not_installed(self.launcher());
        };

        let mut games = Vec::new();
        let mut issues = Vec::new();

        // Store installs have no folder to validate, so Java Edition is only
        // reported for the classic launcher
        if let Some(dir) = location.as_path() {
            match self.java_edition(dir) {
                Ok(game) => games.push(game),
                Err(issue) => issues.push(issue),
            }
        }

        if let Some(package) = self.local_package(BEDROCK_PACKAGE) {
            games.push(
                DetectedGame::new("Minecraft for Windows")
                    .with_external_id(BEDROCK_EDITION_ID)
                    .with_install_path(package)
                    .with_launch_command("minecraft://"),
            );
        }

        finish(self.launcher(), location, games, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamevault_platform::mock::MemorySystem;
    use std::sync::Arc;

    fn probe(system: MemorySystem) -> MinecraftProbe {
        MinecraftProbe::new(ProbeContext::new(Arc::new(system)))
    }

    #[test]
    fn test_classic_launcher_reports_java_edition() {
        let system = MemorySystem::windows_layout()
            .with_file(r"C:\Program Files (x86)\Minecraft Launcher\MinecraftLauncher.exe", "MZ");

        let result = probe(system).detect_games();
        assert!(result.installed);
        assert_eq!(result.games.len(), 1);
        assert_eq!(result.games[0].external_id.as_deref(), Some(JAVA_EDITION_ID));
        assert!(result.games[0].launch_command.is_none());
    }

    #[test]
    fn test_store_launcher_with_bedrock() {
        let system = MemorySystem::windows_layout()
            .with_dir(r"C:\Users\player\AppData\Local\Packages\Microsoft.4297127D64EC6_8wekyb3d8bbwe")
            .with_dir(r"C:\Users\player\AppData\Local\Packages\Microsoft.MinecraftUWP_8wekyb3d8bbwe");

        let probe = probe(system);
        assert_eq!(
            probe.resolve_install_path(),
            Some(InstallLocation::ShellApp(STORE_LAUNCHER_APP.to_string()))
        );

        let result = probe.detect_games();
        assert_eq!(result.games.len(), 1);
        assert_eq!(result.games[0].external_id.as_deref(), Some(BEDROCK_EDITION_ID));
        assert_eq!(result.games[0].launch_command.as_deref(), Some("minecraft://"));
    }

    #[test]
    fn test_absent_everywhere() {
        let result = probe(MemorySystem::windows_layout()).detect_games();
        assert!(!result.installed);
    }
}
