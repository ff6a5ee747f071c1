//! Settings and application paths.
//!
//! Path priority:
//! 1. CLI `--config-dir`
//! 2. `FIC_CONFIG_DIR` environment variable
//! 3. Current directory IF a fic file already lives there (fic.json, fic.log)
//! 4. Platform directory from dirs-next
//!
//! Platform paths:
//! - Linux: ~/.config/fic/{name} (config), ~/.local/share/fic/{name} (data)
//! - macOS: ~/Library/Application Support/fic/{name}
//! - Windows: %APPDATA%\fic\{name}

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE: &str = "fic.json";
pub const LOG_FILE: &str = "fic.log";
const APP_DIR: &str = "fic";
const CONFIG_ENV: &str = "FIC_CONFIG_DIR";

/// Slideshow interval bounds (ms)
pub const MIN_INTERVAL_MS: u64 = 20;
pub const MAX_INTERVAL_MS: u64 = 2000;

/// Overrides for default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args -> ENV var (FIC_CONFIG_DIR) -> None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));
        Self { config_dir }
    }
}

pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::config_dir).join(name)
}

/// Data files (logs)
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::data_dir).join(name)
}

/// Create config and data directories if missing
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = resolve_dir(config, dirs_next::config_dir);
    let data_dir = resolve_dir(config, dirs_next::data_dir);

    for dir in [&config_dir, &data_dir] {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
    }
    Ok(())
}

fn has_local_files(dir: &Path) -> bool {
    [SETTINGS_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

fn resolve_dir(config: &PathConfig, platform: fn() -> Option<PathBuf>) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Ok(current_dir) = std::env::current_dir()
        && has_local_files(&current_dir)
    {
        return current_dir;
    }
    if let Some(dir) = platform() {
        return dir.join(APP_DIR);
    }
    PathBuf::from(".")
}

/// Default worker count: three quarters of the cores, at least one
pub fn default_workers() -> usize {
    (num_cpus::get() * 3 / 4).max(1)
}

/// Persistent viewer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Concurrent decodes during precache
    pub max_workers: usize,
    /// Files above this size (MB) are not decoded
    pub max_file_size_mb: u64,
    /// Expand subfolders into the playlist
    pub include_subfolders: bool,
    pub slideshow_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_workers: default_workers(),
            max_file_size_mb: 100,
            include_subfolders: true,
            slideshow_interval_ms: 200,
        }
    }
}

impl Settings {
    /// Load from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        Ok(settings.sanitized())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, text).with_context(|| format!("Failed to write settings: {}", path.display()))?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Clamp values into their accepted ranges
    pub fn sanitized(mut self) -> Self {
        self.max_workers = self.max_workers.max(1);
        self.slideshow_interval_ms = self.slideshow_interval_ms.clamp(MIN_INTERVAL_MS, MAX_INTERVAL_MS);
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.slideshow_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_with_custom_dir() {
        let config = PathConfig { config_dir: Some(PathBuf::from("/custom")) };
        assert_eq!(config_file("fic.json", &config), PathBuf::from("/custom/fic.json"));
        assert_eq!(data_file("fic.log", &config), PathBuf::from("/custom/fic.log"));
    }

    #[test]
    fn test_cli_dir_beats_env() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/from-cli")));
        assert_eq!(config.config_dir, Some(PathBuf::from("/from-cli")));
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.max_workers >= 1);
        assert_eq!(settings.max_file_size_mb, 100);
        assert!(settings.include_subfolders);
        assert_eq!(settings.interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_save_load_roundtrip_and_clamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);

        let settings = Settings {
            max_workers: 3,
            max_file_size_mb: 7,
            include_subfolders: false,
            slideshow_interval_ms: 500,
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);

        std::fs::write(&path, r#"{"max_workers": 0, "slideshow_interval_ms": 5}"#).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.max_workers, 1);
        assert_eq!(loaded.slideshow_interval_ms, MIN_INTERVAL_MS);
        assert_eq!(loaded.max_file_size_mb, 100);
    }

    #[test]
    fn test_missing_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load(&dir.path().join("none.json")).unwrap(), Settings::default());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(Settings::load(&broken).is_err());
    }
}
