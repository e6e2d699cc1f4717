//! Configuration types for upload watching.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Content categories that can be toggled as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Video files.
    Video,

    /// Image files.
    Image,

    /// Audio files.
    Audio,

    /// Office documents and text.
    Document,

    /// Compressed archives.
    Archive,
}

impl Category {
    /// All categories, in display order.
    pub const ALL: [Category; 5] = [
        Category::Video,
        Category::Image,
        Category::Audio,
        Category::Document,
        Category::Archive,
    ];

    /// The fixed extension list for this category (lower-case, leading dot).
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Video => &[
                ".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v", ".mpeg", ".mpg",
                ".3gp", ".ts",
            ],
            Self::Image => &[
                ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".svg", ".ico", ".tiff", ".psd",
            ],
            Self::Audio => &[
                ".mp3", ".wav", ".flac", ".aac", ".ogg", ".wma", ".m4a", ".opus",
            ],
            Self::Document => &[
                ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".txt", ".md", ".csv",
            ],
            Self::Archive => &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz"],
        }
    }
}

/// Configuration read by the engine.
///
/// The engine never loads or saves this itself; the presentation layer owns
/// persistence and pushes snapshots through `Engine::set_config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Accept video files.
    pub video_enabled: bool,

    /// Accept image files.
    pub image_enabled: bool,

    /// Accept audio files.
    pub audio_enabled: bool,

    /// Accept documents.
    pub doc_enabled: bool,

    /// Accept archives.
    pub archive_enabled: bool,

    /// Extra extensions, normalized on insertion.
    pub custom_extensions: Vec<String>,

    /// Whether subdirectories of the root are watched too.
    pub monitor_subdirs: bool,

    /// Inactivity, in seconds, after which an uploading batch is complete.
    pub completion_timeout_secs: u64,

    /// Directory names whose contents are never batched.
    pub ignored_dirs: Vec<String>,
}

impl WatchConfig {
    /// Create a config with nothing enabled.
    pub fn empty() -> Self {
        Self {
            video_enabled: false,
            image_enabled: false,
            audio_enabled: false,
            doc_enabled: false,
            archive_enabled: false,
            custom_extensions: Vec::new(),
            monitor_subdirs: true,
            completion_timeout_secs: DEFAULT_COMPLETION_TIMEOUT_SECS,
            ignored_dirs: Vec::new(),
        }
    }

    /// Whether a category is enabled.
    pub fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::Video => self.video_enabled,
            Category::Image => self.image_enabled,
            Category::Audio => self.audio_enabled,
            Category::Document => self.doc_enabled,
            Category::Archive => self.archive_enabled,
        }
    }

    /// Toggle a category.
    pub fn set_enabled(&mut self, category: Category, enabled: bool) {
        let flag = match category {
            Category::Video => &mut self.video_enabled,
            Category::Image => &mut self.image_enabled,
            Category::Audio => &mut self.audio_enabled,
            Category::Document => &mut self.doc_enabled,
            Category::Archive => &mut self.archive_enabled,
        };
        *flag = enabled;
    }

    /// Enable a category.
    pub fn with_category(mut self, category: Category) -> Self {
        self.set_enabled(category, true);
        self
    }

    /// Disable a category.
    pub fn without_category(mut self, category: Category) -> Self {
        self.set_enabled(category, false);
        self
    }

    /// Add custom extensions. Blank entries are dropped.
    pub fn with_custom_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.custom_extensions
            .extend(extensions.into_iter().filter_map(|e| normalize_extension(e.as_ref())));
        self
    }

    /// Set whether subdirectories are watched.
    pub fn with_subdirs(mut self, monitor: bool) -> Self {
        self.monitor_subdirs = monitor;
        self
    }

    /// Set the completion timeout in seconds.
    pub fn with_completion_timeout(mut self, secs: u64) -> Self {
        self.completion_timeout_secs = secs;
        self
    }

    /// Add an ignored directory name.
    pub fn ignore_dir(mut self, name: impl Into<String>) -> Self {
        self.ignored_dirs.push(name.into());
        self
    }

    /// Default ignored directory names.
    fn default_ignored_dirs() -> Vec<String> {
        [".git", "node_modules", "__pycache__", ".idea", "vendor", "target"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            video_enabled: true,
            ignored_dirs: Self::default_ignored_dirs(),
            ..Self::empty()
        }
    }
}

/// Default completion timeout in seconds.
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 30;

/// Normalize a user supplied extension: trimmed, lower-cased, leading dot.
///
/// Returns `None` for blank input.
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lowered = trimmed.to_lowercase();
    if lowered.starts_with('.') {
        Some(lowered)
    } else {
        Some(format!(".{lowered}"))
    }
}

/// Parse a comma separated extension list such as `"psd, ai, .sketch"`.
pub fn parse_custom_extensions(raw: &str) -> Vec<String> {
    raw.split(',').filter_map(normalize_extension).collect()
}

/// How a configured completion timeout is turned into an effective duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// Configured values below this are rejected.
    pub floor: Duration,

    /// Used in place of a rejected value.
    pub fallback: Duration,
}

impl TimeoutPolicy {
    /// Create a policy.
    pub fn new(floor: Duration, fallback: Duration) -> Self {
        Self { floor, fallback }
    }

    /// Effective timeout for a configured number of seconds.
    pub fn effective(&self, configured_secs: u64) -> Duration {
        let configured = Duration::from_secs(configured_secs);
        if configured < self.floor {
            self.fallback
        } else {
            configured
        }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            floor: Duration::from_secs(10),
            fallback: Duration::from_secs(DEFAULT_COMPLETION_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = WatchConfig::default();

        assert!(config.video_enabled);
        assert!(!config.image_enabled);
        assert!(config.monitor_subdirs);
        assert_eq!(config.completion_timeout_secs, 30);
        assert!(config.ignored_dirs.contains(&"node_modules".to_string()));
    }

    #[test]
    fn test_builder_toggles() {
        let config = WatchConfig::empty()
            .with_category(Category::Audio)
            .with_category(Category::Video)
            .without_category(Category::Video)
            .with_subdirs(false)
            .with_completion_timeout(45);

        assert!(config.is_enabled(Category::Audio));
        assert!(!config.is_enabled(Category::Video));
        assert!(!config.monitor_subdirs);
        assert_eq!(config.completion_timeout_secs, 45);
    }

    #[test]
    fn test_custom_extension_normalization() {
        assert_eq!(normalize_extension("  PSD "), Some(".psd".to_string()));
        assert_eq!(normalize_extension(".Sketch"), Some(".sketch".to_string()));
        assert_eq!(normalize_extension("   "), None);

        assert_eq!(
            parse_custom_extensions("psd, ai, .sketch,,"),
            vec![".psd", ".ai", ".sketch"]
        );
    }

    #[test]
    fn test_timeout_policy_floor() {
        let policy = TimeoutPolicy::default();

        assert_eq!(policy.effective(45), Duration::from_secs(45));
        assert_eq!(policy.effective(10), Duration::from_secs(10));
        assert_eq!(policy.effective(9), Duration::from_secs(30));
        assert_eq!(policy.effective(0), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: WatchConfig =
            serde_json::from_str(r#"{"image_enabled": true, "completion_timeout_secs": 60}"#)
                .unwrap();

        assert!(config.video_enabled);
        assert!(config.image_enabled);
        assert_eq!(config.completion_timeout_secs, 60);
    }
}
