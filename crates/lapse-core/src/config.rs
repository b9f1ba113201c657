use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retention::RetentionPolicy;
use crate::store::JsonFileStore;

/// Directory holding config and the default item file.
pub const LAPSE_DIR: &str = ".lapse";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapseConfig {
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_archive_purge_days")]
    pub archive_purge_days: u32,
    #[serde(default = "default_expiry_fade_hours")]
    pub expiry_fade_hours: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            archive_purge_days: default_archive_purge_days(),
            expiry_fade_hours: default_expiry_fade_hours(),
        }
    }
}

impl RetentionConfig {
    #[must_use]
    pub fn policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            archive_purge_after: chrono::Duration::days(i64::from(self.archive_purge_days)),
            expiry_fade_after: chrono::Duration::hours(i64::from(self.expiry_fade_hours)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Store path, relative paths anchored at `project_root`.
    #[must_use]
    pub fn resolve_path(&self, project_root: &Path) -> PathBuf {
        if self.path.is_absolute() {
            self.path.clone()
        } else {
            project_root.join(&self.path)
        }
    }

    #[must_use]
    pub fn open(&self, project_root: &Path) -> JsonFileStore {
        JsonFileStore::new(self.resolve_path(project_root))
            .with_lock_timeout(Duration::from_millis(self.lock_timeout_ms))
    }
}

pub fn load_config(project_root: &Path) -> Result<LapseConfig> {
    let path = project_root.join(LAPSE_DIR).join("config.toml");
    if !path.exists() {
        return Ok(LapseConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<LapseConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    anyhow::ensure!(
        config.scheduler.interval_secs > 0,
        "Failed to parse {}: scheduler.interval_secs must be at least 1",
        path.display()
    );
    Ok(config)
}

const fn default_archive_purge_days() -> u32 {
    7
}

const fn default_expiry_fade_hours() -> u32 {
    24
}

const fn default_interval_secs() -> u64 {
    60
}

fn default_store_path() -> PathBuf {
    PathBuf::from(LAPSE_DIR).join("items.json")
}

const fn default_lock_timeout_ms() -> u64 {
    5_000
}
