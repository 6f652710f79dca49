//! Launch resolution: validate a stored directive, fall back to the executable

use crate::directive::{LaunchDirective, first_token, parse_directive};
use crate::policy::LaunchPolicy;
use crate::spawner::ProcessSpawner;
use gamevault_platform::{KnownFolder, SharedSystem, is_under};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of a launch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    Success { pid: u32 },
    InvalidCommand,
    ExecutableNotFound,
    PermissionDenied,
    LauncherNotInstalled,
    ProcessStartFailed { command: String },
    GameNotFound,
}

impl LaunchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LaunchOutcome::Success { .. })
    }

    pub fn pid(&self) -> Option<u32> {
        match self {
            LaunchOutcome::Success { pid } => Some(*pid),
            _ => None,
        }
    }
}

impl fmt::Display for LaunchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchOutcome::Success { pid } => write!(f, "started (pid {})", pid),
            LaunchOutcome::InvalidCommand => write!(f, "launch command rejected"),
            LaunchOutcome::ExecutableNotFound => write!(f, "executable not found"),
            LaunchOutcome::PermissionDenied => write!(f, "permission denied"),
            LaunchOutcome::LauncherNotInstalled => write!(f, "launcher not installed"),
            LaunchOutcome::ProcessStartFailed { command } => write!(f, "failed to start: {}", command),
            LaunchOutcome::GameNotFound => write!(f, "game not found"),
        }
    }
}

/// What to launch for one game
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    pub directive: Option<&'a str>,
    pub executable: Option<&'a Path>,
    /// Whether the owning launcher was found by the last scan
    pub launcher_installed: bool,
}

impl<'a> LaunchRequest<'a> {
    pub fn new(directive: Option<&'a str>, executable: Option<&'a Path>) -> Self {
        Self {
            directive,
            executable,
            launcher_installed: true,
        }
    }

    pub fn with_launcher_installed(mut self, installed: bool) -> Self {
        self.launcher_installed = installed;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    /// Fails the allow/deny rules
    Invalid,
    /// Names a program that does not exist
    Missing,
}

pub struct LaunchResolver {
    system: SharedSystem,
    spawner: Arc<dyn ProcessSpawner>,
    policy: LaunchPolicy,
}

impl LaunchResolver {
    pub fn new(system: SharedSystem, spawner: Arc<dyn ProcessSpawner>, policy: LaunchPolicy) -> Self {
        Self {
            system,
            spawner,
            policy,
        }
    }

    pub fn policy(&self) -> &LaunchPolicy {
        &self.policy
    }

    /// Whether `command` would be accepted as a launch directive
    ///
    /// Allowed URIs are accepted without touching the filesystem.
    pub fn is_valid_launch_command(&self, command: &str) -> bool {
        self.resolve(command).is_ok()
    }

    /// Try `directive`, then `executable`
    pub fn launch(&self, directive: Option<&str>, executable: Option<&Path>) -> LaunchOutcome {
        self.launch_request(&LaunchRequest::new(directive, executable))
    }

    pub fn launch_request(&self, request: &LaunchRequest<'_>) -> LaunchOutcome {
        let mut directive_outcome = None;
        if let Some(command) = request.directive.map(str::trim).filter(|c| !c.is_empty()) {
            let outcome = self.launch_directive(command, request.launcher_installed);
            if outcome.is_success() {
                return outcome;
            }
            directive_outcome = Some(outcome);
        }

        let Some(executable) = request.executable else {
            return directive_outcome.unwrap_or(LaunchOutcome::InvalidCommand);
        };

        match self.validate_program(executable) {
            Ok(path) => {
                tracing::info!("Launching {}", path.display());
                match self.spawner.spawn(&path, &[], working_dir(&path)) {
                    Ok(pid) => LaunchOutcome::Success { pid },
                    Err(e) => {
                        tracing::warn!("Failed to start {}: {}", path.display(), e);
                        program_failure(&e, &path.to_string_lossy())
                    }
                }
            }
            Err(Rejection::Missing) => {
                tracing::warn!("Executable {} not found", executable.display());
                LaunchOutcome::ExecutableNotFound
            }
            Err(Rejection::Invalid) => {
                tracing::warn!("Rejected executable {}", executable.display());
                LaunchOutcome::InvalidCommand
            }
        }
    }

    fn launch_directive(&self, command: &str, launcher_installed: bool) -> LaunchOutcome {
        match self.resolve(command) {
            Ok(LaunchDirective::Uri(uri)) if !launcher_installed => {
                tracing::warn!("Launcher for {} is not installed", uri);
                LaunchOutcome::LauncherNotInstalled
            }
            Ok(LaunchDirective::Uri(uri)) => {
                tracing::info!("Opening {}", uri);
                match self.spawner.open_uri(&uri) {
                    Ok(pid) => LaunchOutcome::Success { pid },
                    Err(e) => {
                        tracing::warn!("Failed to open {}: {}", uri, e);
                        uri_failure(&e, command)
                    }
                }
            }
            Ok(LaunchDirective::Program { path, args }) => {
                tracing::info!("Launching {}", path.display());
                match self.spawner.spawn(&path, &args, working_dir(&path)) {
                    Ok(pid) => LaunchOutcome::Success { pid },
                    Err(e) => {
                        tracing::warn!("Failed to start {}: {}", path.display(), e);
                        program_failure(&e, command)
                    }
                }
            }
            Err(rejection) => {
                tracing::warn!("Rejected launch directive ({:?})", rejection);
                LaunchOutcome::InvalidCommand
            }
        }
    }

    fn resolve(&self, command: &str) -> Result<LaunchDirective, Rejection> {
        let command = command.trim();
        let directive = parse_directive(command).map_err(|e| {
            tracing::debug!("Unparseable launch directive: {}", e);
            Rejection::Invalid
        })?;

        match directive {
            LaunchDirective::Uri(uri) => {
                let allowed = uri_scheme_allowed(&self.policy, &uri);
                let clean = !uri.chars().any(|c| c.is_control() || c == '"');
                if allowed && clean {
                    Ok(LaunchDirective::Uri(uri))
                } else {
                    Err(Rejection::Invalid)
                }
            }
            LaunchDirective::Program { path, args } => {
                if !command.starts_with('"') && self.policy.is_denied_interpreter(first_token(command)) {
                    return Err(Rejection::Invalid);
                }
                let path = self.validate_program(&path)?;
                Ok(LaunchDirective::Program { path, args })
            }
        }
    }

    /// Existing program path that is neither an interpreter nor a system binary
    fn validate_program(&self, path: &Path) -> Result<PathBuf, Rejection> {
        let raw = path.to_string_lossy();
        if self.policy.is_denied_interpreter(&raw) {
            return Err(Rejection::Invalid);
        }

        let resolved = if self.system.is_file(path) {
            path.to_path_buf()
        } else if !raw.contains(['/', '\\']) {
            which::which(raw.as_ref()).map_err(|_| Rejection::Missing)?
        } else {
            return Err(Rejection::Missing);
        };

        if self.policy.is_denied_interpreter(&resolved.to_string_lossy()) || self.is_system_path(&resolved) {
            return Err(Rejection::Invalid);
        }
        Ok(resolved)
    }

    fn is_system_path(&self, path: &Path) -> bool {
        [KnownFolder::System, KnownFolder::SystemRoot]
            .into_iter()
            .filter_map(|folder| self.system.known_folder(folder))
            .any(|root| is_under(path, &root))
    }
}

/// Containing folder, if the path has one
fn working_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|dir| !dir.as_os_str().is_empty())
}

fn uri_scheme_allowed(policy: &LaunchPolicy, uri: &str) -> bool {
    crate::directive::uri_scheme(uri).is_some_and(|scheme| policy.is_allowed_scheme(scheme))
}

fn uri_failure(e: &io::Error, command: &str) -> LaunchOutcome {
    match e.kind() {
        io::ErrorKind::NotFound => LaunchOutcome::LauncherNotInstalled,
        io::ErrorKind::PermissionDenied => LaunchOutcome::PermissionDenied,
        _ => LaunchOutcome::ProcessStartFailed {
            command: command.to_string(),
        },
    }
}

fn program_failure(e: &io::Error, command: &str) -> LaunchOutcome {
    match e.kind() {
        io::ErrorKind::NotFound => LaunchOutcome::ExecutableNotFound,
        io::ErrorKind::PermissionDenied => LaunchOutcome::PermissionDenied,
        _ => LaunchOutcome::ProcessStartFailed {
            command: command.to_string(),
        },
    }
}
