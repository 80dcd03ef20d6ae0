//! Application configuration layered from defaults, a config file, and the environment.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::save::SaveManager;

/// Directory under the user's config directory holding `config.json`.
pub const CONFIG_DIR: &str = "sizzlestar";
/// Name of the config file.
pub const CONFIG_FILE: &str = "config.json";
/// Prefix for environment overrides, e.g. `SIZZLESTAR_CONTENT_DIR`.
pub const ENV_PREFIX: &str = "SIZZLESTAR";

/// Where content, saves and logs live, and how often to checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory containing `config.json` and `tabs/`.
    pub content_dir: PathBuf,
    /// Save file location.
    pub save_path: PathBuf,
    /// Seconds between checkpoints while playing; 0 disables them.
    pub autosave_secs: u64,
    /// Directory receiving `sizzlestar.log`.
    pub log_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("content"),
            save_path: SaveManager::default_path(),
            autosave_secs: 60,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl AppConfig {
    /// Load from the default config file and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load using `path` as the config file. A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let defaults = Self::default();
        let settings = Config::builder()
            .set_default("content_dir", path_string(&defaults.content_dir))?
            .set_default("save_path", path_string(&defaults.save_path))?
            .set_default("autosave_secs", defaults.autosave_secs as i64)?
            .set_default("log_dir", path_string(&defaults.log_dir))?
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let config: AppConfig = settings
            .try_deserialize()
            .context("invalid application configuration")?;
        Ok(config)
    }

    /// Checkpoint interval, if checkpoints are enabled.
    pub fn autosave_interval(&self) -> Option<Duration> {
        (self.autosave_secs > 0).then(|| Duration::from_secs(self.autosave_secs))
    }
}

/// Default config file location.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Write the default config file if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    ensure_config_at(&config_path())
}

fn ensure_config_at(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(&AppConfig::default())
        .context("failed to serialize default configuration")?;
    fs::write(path, serialized).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_file_round_trips() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("sizzlestar").join(CONFIG_FILE);

        ensure_config_at(&path)?;
        assert!(path.exists());
        let loaded = AppConfig::load_from(&path)?;
        assert_eq!(loaded.content_dir, PathBuf::from("content"));
        assert_eq!(loaded.autosave_secs, 60);
        assert_eq!(loaded.autosave_interval(), Some(Duration::from_secs(60)));
        Ok(())
    }

    #[test]
    fn file_values_override_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{"content_dir": "/srv/sizzle", "save_path": "/tmp/s.szs", "autosave_secs": 0, "log_dir": "l"}"#,
        )?;

        let loaded = AppConfig::load_from(&path)?;
        assert_eq!(loaded.content_dir, PathBuf::from("/srv/sizzle"));
        assert_eq!(loaded.save_path, PathBuf::from("/tmp/s.szs"));
        assert_eq!(loaded.autosave_interval(), None);
        Ok(())
    }

    #[test]
    fn existing_file_is_left_alone() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{}")?;
        ensure_config_at(&path)?;
        assert_eq!(fs::read_to_string(&path)?, "{}");
        Ok(())
    }
}
