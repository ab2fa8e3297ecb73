//! Configuration types and loading for askdb.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::APP_NAME;
use crate::Error;
use crate::conversations::{DEFAULT_CONVERSATION_TTL_MINUTES, DEFAULT_MAX_CONTEXT_MESSAGES};
use crate::error::Result;
use crate::history::{
    DEFAULT_HISTORY_RETENTION_HOURS, DEFAULT_MAX_FAVORITES, DEFAULT_MAX_HISTORY_PER_SESSION,
};
use crate::providers::{DbProviderKind, LlmProviderKind};
use crate::sessions::DEFAULT_SESSION_TTL_MINUTES;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the durable query log database.
    pub database: PathBuf,

    /// History and favorites bounds.
    pub history: HistoryConfig,

    /// Authenticated-session lifetimes.
    pub sessions: SessionConfig,

    /// Conversation lifetimes and context windowing.
    pub conversations: ConversationConfig,

    /// Collaborator backend selection.
    pub providers: ProviderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME);

        Self {
            database: data_dir.join("askdb.db"),
            history: HistoryConfig::default(),
            sessions: SessionConfig::default(),
            conversations: ConversationConfig::default(),
            providers: ProviderConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        config.expand_paths();
        Ok(config)
    }

    /// Get the default config file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
            .join("config.toml")
    }

    /// Save configuration to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Ensure config exists at the given path, creating defaults if missing.
    pub fn ensure_at(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_path(path)
        } else {
            let mut config = Self::default();
            config.expand_paths();
            config.save_to_path(path)?;
            Ok(config)
        }
    }

    /// Expand a path, replacing ~ with home directory.
    pub fn expand_path(path: &str) -> PathBuf {
        let expanded = shellexpand::full(path)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| path.to_string());
        PathBuf::from(expanded)
    }

    fn expand_paths(&mut self) {
        self.database = Self::expand_path(&self.database.to_string_lossy());
    }
}

/// Bounds for the history store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Cap on non-favorite cached records per session.
    pub max_history_per_session: usize,

    /// Cap on favorite records.
    pub max_favorites: usize,

    /// Hours a non-favorite entry stays in the recency cache.
    pub retention_hours: i64,

    /// Seconds between background cache prunes.
    pub sweep_interval_secs: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history_per_session: DEFAULT_MAX_HISTORY_PER_SESSION,
            max_favorites: DEFAULT_MAX_FAVORITES,
            retention_hours: DEFAULT_HISTORY_RETENTION_HOURS,
            sweep_interval_secs: 3600,
        }
    }
}

/// Authenticated-session lifetimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minutes of inactivity before a session expires.
    pub ttl_minutes: i64,

    /// Seconds between background expiry sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
            sweep_interval_secs: 300,
        }
    }
}

/// Conversation lifetimes and context windowing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Minutes of inactivity before a conversation expires.
    pub ttl_minutes: i64,

    /// Seconds between background expiry sweeps.
    pub sweep_interval_secs: u64,

    /// Trailing messages included in the language-model context.
    pub max_context_messages: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: DEFAULT_CONVERSATION_TTL_MINUTES,
            sweep_interval_secs: 300,
            max_context_messages: DEFAULT_MAX_CONTEXT_MESSAGES,
        }
    }
}

/// Collaborator backend selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Language-model backend.
    pub llm: LlmProviderKind,

    /// Database backend queries run against.
    pub database: DbProviderKind,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
