//! Editor configuration (_config.yml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftsmithConfig {
    pub database: DatabaseConfig,
    pub autosave: AutoSaveConfig,
    pub local_store: LocalStoreConfig,
    pub versions: VersionsConfig,
    pub reading: ReadingConfig,

    /// Acting user for command line operations
    pub user: Option<String>,

    // Unrecognised keys, kept so they survive a reload
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl DraftsmithConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Relational draft store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ".draftsmith/drafts.db".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

/// Auto-save timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    pub debounce_ms: u64,
    pub interval_ms: u64,
    /// Show the "Draft saved" notification
    pub show_indicator: bool,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            interval_ms: 10_000,
            show_indicator: true,
        }
    }
}

impl AutoSaveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn interval(&self) -> Duration {
        // A zero period would spin the timer
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// Local fallback store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStoreConfig {
    pub dir: String,
    pub max_entries: usize,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            dir: ".draftsmith/local".to_string(),
            max_entries: crate::drafts::LOCAL_RETENTION,
        }
    }
}

/// Version history sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionsConfig {
    pub list_limit: usize,
    pub display_limit: usize,
}

impl Default for VersionsConfig {
    fn default() -> Self {
        Self {
            list_limit: crate::drafts::DEFAULT_LIST_LIMIT,
            display_limit: crate::drafts::DISPLAY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingConfig {
    pub words_per_minute: usize,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            words_per_minute: crate::content::stats::DEFAULT_WORDS_PER_MINUTE,
        }
    }
}
