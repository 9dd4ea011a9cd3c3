// Daemon configuration at `~/.padsync/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use padsync_common::changeset::CombineOptions;

use crate::bridge::{BridgeOptions, DEFAULT_BANNER_COLOR};
use crate::outbox::DEFAULT_CAPACITY;
use crate::startup::{restrict_dir_to_owner, restrict_file_to_owner};

/// Root directory for padsync state: `~/.padsync/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".padsync"))
}

/// Path to the config file: `~/.padsync/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory backing content pads. `--workspace-root` overrides it.
    pub workspace_root: Option<PathBuf>,
    pub sync: SyncConfig,
    pub run: RunConfig,
    pub outbox: OutboxConfig,
}

impl DaemonConfig {
    /// Load from `~/.padsync/config.toml`, falling back to defaults when the
    /// file is missing or unreadable.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
            restrict_dir_to_owner(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)?;
        restrict_file_to_owner(path).map_err(ConfigError::Io)
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            combine: CombineOptions { merge_equal_attributes: self.sync.merge_equal_attributes },
            banner_color: self.run.banner_color.clone(),
            outbox_capacity: self.outbox.capacity,
        }
    }
}

/// Changeset replay settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Merge adjacent same-kind operations whose attribute lists are equal.
    pub merge_equal_attributes: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// `r,g,b` foreground of the started/stopped banners.
    pub banner_color: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { banner_color: DEFAULT_BANNER_COLOR.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct OutboxConfig {
    /// Events kept for pollers before the oldest are dropped.
    pub capacity: usize,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self { capacity: DEFAULT_CAPACITY }
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
