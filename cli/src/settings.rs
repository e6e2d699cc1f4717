//! Persisted user settings.
//!
//! Stored as JSON under the user config directory. Unknown fields are
//! ignored and missing ones take their defaults, so files written by older
//! versions keep loading.

use std::path::{Path, PathBuf};

use anyhow::Context;
use batchwatch_engine::config::parse_custom_extensions;
use batchwatch_engine::history::APP_DIR_NAME;
use batchwatch_engine::{Category, WatchConfig};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::args::SettingsOverrides;

/// File name of the settings file.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// User settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder watched when none is given on the command line.
    pub watch_folder: String,

    pub video_enabled: bool,
    pub image_enabled: bool,
    pub audio_enabled: bool,
    pub doc_enabled: bool,
    pub archive_enabled: bool,

    /// Comma separated extra extensions.
    pub custom_exts: String,

    pub monitor_subdirs: bool,

    /// Seconds of inactivity after which a batch is complete.
    pub completion_timeout: u64,

    pub notify_on_start: bool,
    pub notify_on_complete: bool,
    pub save_history: bool,

    /// Directory names that are never watched.
    pub ignore_folders: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let engine_defaults = WatchConfig::default();

        Self {
            watch_folder: String::new(),
            video_enabled: true,
            image_enabled: false,
            audio_enabled: false,
            doc_enabled: false,
            archive_enabled: false,
            custom_exts: String::new(),
            monitor_subdirs: true,
            completion_timeout: engine_defaults.completion_timeout_secs,
            notify_on_start: true,
            notify_on_complete: true,
            save_history: true,
            ignore_folders: engine_defaults.ignored_dirs,
        }
    }
}

impl Settings {
    /// `<config_dir>/batchwatch/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load settings. A missing file yields defaults; an unreadable or
    /// malformed one is reported and also yields defaults.
    pub async fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Failed to read settings {}: {e}", path.display());
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring malformed settings {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Write settings to `path`, creating parent directories.
    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .with_context(|| format!("failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, path)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// The saved watch folder, if any.
    pub fn watch_folder(&self) -> Option<PathBuf> {
        let trimmed = self.watch_folder.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }

    fn set_category(&mut self, category: Category, enabled: bool) {
        let flag = match category {
            Category::Video => &mut self.video_enabled,
            Category::Image => &mut self.image_enabled,
            Category::Audio => &mut self.audio_enabled,
            Category::Document => &mut self.doc_enabled,
            Category::Archive => &mut self.archive_enabled,
        };
        *flag = enabled;
    }

    /// Apply command line overrides. Disables win over enables.
    pub fn apply(&mut self, overrides: &SettingsOverrides) {
        if overrides.no_subdirs {
            self.monitor_subdirs = false;
        }
        if let Some(timeout) = overrides.timeout {
            self.completion_timeout = timeout;
        }
        if let Some(ext) = &overrides.ext {
            self.custom_exts = ext.clone();
        }
        for category in &overrides.enable {
            self.set_category((*category).into(), true);
        }
        for category in &overrides.disable {
            self.set_category((*category).into(), false);
        }
        if overrides.no_history {
            self.save_history = false;
        }
    }

    /// Engine configuration derived from these settings.
    pub fn to_watch_config(&self) -> WatchConfig {
        WatchConfig {
            video_enabled: self.video_enabled,
            image_enabled: self.image_enabled,
            audio_enabled: self.audio_enabled,
            doc_enabled: self.doc_enabled,
            archive_enabled: self.archive_enabled,
            custom_extensions: parse_custom_extensions(&self.custom_exts),
            monitor_subdirs: self.monitor_subdirs,
            completion_timeout_secs: self.completion_timeout,
            ignored_dirs: self.ignore_folders.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::CategoryArg;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_engine() {
        let settings = Settings::default();
        let config = settings.to_watch_config();

        assert_eq!(config, WatchConfig::default());
        assert!(settings.notify_on_start);
        assert!(settings.save_history);
        assert_eq!(settings.watch_folder(), None);
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let settings: Settings = serde_json::from_str(
            r#"{"image_enabled": true, "custom_exts": "psd, ai", "sound_enabled": false}"#,
        )
        .unwrap();

        assert!(settings.video_enabled);
        assert!(settings.image_enabled);
        assert_eq!(settings.completion_timeout, 30);
        assert_eq!(
            settings.to_watch_config().custom_extensions,
            vec![".psd", ".ai"]
        );
    }

    #[test]
    fn test_apply_overrides() {
        let mut settings = Settings::default();
        settings.apply(&SettingsOverrides {
            no_subdirs: true,
            timeout: Some(90),
            ext: Some("raw".to_string()),
            enable: vec![CategoryArg::Audio, CategoryArg::Image],
            disable: vec![CategoryArg::Video, CategoryArg::Image],
            no_history: true,
        });

        let config = settings.to_watch_config();
        assert!(!config.monitor_subdirs);
        assert_eq!(config.completion_timeout_secs, 90);
        assert_eq!(config.custom_extensions, vec![".raw"]);
        assert!(config.audio_enabled);
        assert!(!config.image_enabled);
        assert!(!config.video_enabled);
        assert!(!settings.save_history);
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load(&temp_dir.path().join("config.json")).await;

        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_malformed_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(Settings::load(&path).await, Settings::default());
    }

    #[tokio::test]
    async fn test_settings_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("batchwatch/config.json");

        let mut settings = Settings::default();
        settings.watch_folder = "/srv/uploads".to_string();
        settings.archive_enabled = true;
        settings.save(&path).await.unwrap();

        let loaded = Settings::load(&path).await;
        assert_eq!(loaded, settings);
        assert_eq!(loaded.watch_folder(), Some(PathBuf::from("/srv/uploads")));
    }
}
