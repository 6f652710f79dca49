//! Configuration management for GameVault
//!
//! Settings live in a TOML file. The user file wins over the system-wide one,
//! and `GAMEVAULT__SECTION__KEY` environment variables override both.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Layered configuration error: {0}")]
    Layered(#[from] config::ConfigError),
}

/// System-wide configuration directory
pub const SYSTEM_CONFIG_DIR: &str = if cfg!(windows) {
    r"C:\ProgramData\GameVault"
} else {
    "/etc/gamevault"
};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "GAMEVAULT";

/// Deepest drive walk we allow
pub const MAX_DRIVE_SCAN_DEPTH: usize = 8;

/// Library storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// SQLite database location, defaults to the user data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

impl LibraryConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("GameVault")
                .join("library.db")
        })
    }
}

/// Detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Allow heuristic walks of every local drive root
    #[serde(default = "default_drive_scan")]
    pub drive_scan: bool,

    /// Directory depth for heuristic walks
    #[serde(default = "default_drive_scan_depth")]
    pub drive_scan_depth: usize,

    /// Time limit for one heuristic walk
    #[serde(default = "default_drive_scan_timeout")]
    pub drive_scan_timeout_secs: u64,

    /// Additional roots searched by heuristic walks
    #[serde(default)]
    pub extra_roots: Vec<PathBuf>,

    /// Launcher keys never scanned
    #[serde(default)]
    pub disabled_launchers: Vec<String>,
}

fn default_drive_scan() -> bool {
    true
}

fn default_drive_scan_depth() -> usize {
    3
}

fn default_drive_scan_timeout() -> u64 {
    30
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            drive_scan: default_drive_scan(),
            drive_scan_depth: default_drive_scan_depth(),
            drive_scan_timeout_secs: default_drive_scan_timeout(),
            extra_roots: Vec::new(),
            disabled_launchers: Vec::new(),
        }
    }
}

/// Cross-launcher duplicate handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Launcher keys in the order they win duplicate groups
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,
}

fn default_priority() -> Vec<String> {
    vec!["steam".to_string()]
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
        }
    }
}

/// Launch policy extensions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// URI schemes accepted on top of the built-in launcher schemes
    #[serde(default)]
    pub extra_uri_schemes: Vec<String>,

    /// Executable names refused on top of the built-in interpreter list
    #[serde(default)]
    pub extra_denied_interpreters: Vec<String>,
}

/// Main GameVault configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameVaultConfig {
    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub launch: LaunchConfig,
}

impl GameVaultConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a file (if any) with environment overrides applied on top
    pub fn load_layered(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Toml),
            );
        }

        let built = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("dedup.priority")
                    .with_list_parse_key("scan.extra_roots")
                    .with_list_parse_key("scan.disabled_launchers")
                    .with_list_parse_key("launch.extra_uri_schemes")
                    .with_list_parse_key("launch.extra_denied_interpreters")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = built.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        // Try user config first, then system config
        if let Some(user_config) = Self::user_config_path().filter(|path| path.exists()) {
            return Self::load_layered(Some(&user_config));
        }

        let system_config = Path::new(SYSTEM_CONFIG_DIR).join("config.toml");
        if system_config.exists() {
            return Self::load_layered(Some(&system_config));
        }

        tracing::debug!("No configuration file found, using defaults");
        Self::load_layered(None)
    }

    /// Per-user configuration file location
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("GameVault").join("config.toml"))
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the scanner cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.drive_scan_depth == 0 || self.scan.drive_scan_depth > MAX_DRIVE_SCAN_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "scan.drive_scan_depth must be between 1 and {}",
                MAX_DRIVE_SCAN_DEPTH
            )));
        }
        if self.dedup.priority.iter().any(|key| key.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "dedup.priority contains an empty launcher key".to_string(),
            ));
        }
        Ok(())
    }
}
