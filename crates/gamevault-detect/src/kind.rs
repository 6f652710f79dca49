//! Supported launcher identities

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Every launcher GameVault knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LauncherKind {
    Steam,
    EpicGames,
    EAApp,
    UbisoftConnect,
    GogGalaxy,
    BattleNet,
    RockstarGames,
    RiotGames,
    Minecraft,
    Roblox,
    /// User-entered games, never owned by a probe
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown launcher: {0}")]
pub struct ParseLauncherError(pub String);

impl LauncherKind {
    /// Stable iteration order
    pub const ALL: [LauncherKind; 11] = [
        LauncherKind::Steam,
        LauncherKind::EpicGames,
        LauncherKind::EAApp,
        LauncherKind::UbisoftConnect,
        LauncherKind::GogGalaxy,
        LauncherKind::BattleNet,
        LauncherKind::RockstarGames,
        LauncherKind::RiotGames,
        LauncherKind::Minecraft,
        LauncherKind::Roblox,
        LauncherKind::Manual,
    ];

    /// Storage and configuration key
    pub fn key(&self) -> &'static str {
        match self {
            LauncherKind::Steam => "steam",
            LauncherKind::EpicGames => "epic_games",
            LauncherKind::EAApp => "ea_app",
            LauncherKind::UbisoftConnect => "ubisoft_connect",
            LauncherKind::GogGalaxy => "gog_galaxy",
            LauncherKind::BattleNet => "battle_net",
            LauncherKind::RockstarGames => "rockstar_games",
            LauncherKind::RiotGames => "riot_games",
            LauncherKind::Minecraft => "minecraft",
            LauncherKind::Roblox => "roblox",
            LauncherKind::Manual => "manual",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LauncherKind::Steam => "Steam",
            LauncherKind::EpicGames => "Epic Games Launcher",
            LauncherKind::EAApp => "EA app",
            LauncherKind::UbisoftConnect => "Ubisoft Connect",
            LauncherKind::GogGalaxy => "GOG Galaxy",
            LauncherKind::BattleNet => "Battle.net",
            LauncherKind::RockstarGames => "Rockstar Games Launcher",
            LauncherKind::RiotGames => "Riot Client",
            LauncherKind::Minecraft => "Minecraft Launcher",
            LauncherKind::Roblox => "Roblox",
            LauncherKind::Manual => "Manually added",
        }
    }

    /// Whether a probe owns this launcher's games
    pub fn is_probed(&self) -> bool {
        !matches!(self, LauncherKind::Manual)
    }

    /// Launchers that have a probe, in stable order
    pub fn probed() -> impl Iterator<Item = LauncherKind> {
        Self::ALL.into_iter().filter(LauncherKind::is_probed)
    }
}

impl fmt::Display for LauncherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for LauncherKind {
    type Err = ParseLauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        Self::ALL
            .into_iter()
            .find(|kind| {
                let key: String = kind.key().chars().filter(|c| *c != '_').collect();
                let display: String = kind
                    .display_name()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_ascii_lowercase();
                wanted == key || wanted == display
            })
            .ok_or_else(|| ParseLauncherError(s.to_string()))
    }
}
