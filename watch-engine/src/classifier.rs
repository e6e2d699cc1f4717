//! Accept/reject decisions for raw file events.
//!
//! Everything here is pure and cheap; it is re-evaluated for every event so
//! that category toggles take effect without restarting a session.

use std::path::{Component, Path};

use crate::config::{Category, WatchConfig, normalize_extension};

/// Name fragments that mark a transient write (editor swap files, partial
/// downloads, lock files).
pub const TEMP_MARKERS: &[&str] = &[
    ".tmp",
    ".temp",
    ".part",
    ".partial",
    ".crdownload",
    "~$",
    ".swp",
    ".lock",
];

/// Whether the file name looks like a temporary artifact.
pub fn is_temporary_artifact(path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.to_string_lossy().to_lowercase();

    TEMP_MARKERS
        .iter()
        .any(|marker| name.contains(marker) || name.starts_with(marker))
}

/// Extensions accepted under `config`: every enabled category plus the custom
/// list. Duplicates are kept; callers only test membership.
pub fn enabled_extensions(config: &WatchConfig) -> Vec<String> {
    let mut extensions: Vec<String> = Category::ALL
        .iter()
        .filter(|category| config.is_enabled(**category))
        .flat_map(|category| category.extensions().iter().map(ToString::to_string))
        .collect();

    extensions.extend(
        config
            .custom_extensions
            .iter()
            .filter_map(|ext| normalize_extension(ext)),
    );

    extensions
}

/// Whether a file event for `path` should be batched.
pub fn is_monitored_file(path: &Path, config: &WatchConfig) -> bool {
    if is_temporary_artifact(path) {
        return false;
    }

    let Some(extension) = path.extension() else {
        return false;
    };
    let extension = format!(".{}", extension.to_string_lossy().to_lowercase());

    enabled_extensions(config).contains(&extension)
}

/// Whether any directory component of `relative` is an ignored directory.
///
/// `relative` is the event path relative to the watch root, so a root that
/// itself lives under e.g. `target/` is still watched.
pub fn is_in_ignored_dir(relative: &Path, config: &WatchConfig) -> bool {
    relative
        .parent()
        .is_some_and(|parent| is_ignored_directory(parent, config))
}

/// Whether `relative_dir`, a directory relative to the watch root, is or sits
/// under an ignored directory.
pub fn is_ignored_directory(relative_dir: &Path, config: &WatchConfig) -> bool {
    if config.ignored_dirs.is_empty() {
        return false;
    }

    relative_dir.components().any(|component| match component {
        Component::Normal(name) => {
            is_ignored_dir_name(&name.to_string_lossy(), &config.ignored_dirs)
        }
        _ => false,
    })
}

/// Whether a directory name itself is ignored. Used while walking the tree.
pub fn is_ignored_dir_name(name: &str, ignored_dirs: &[String]) -> bool {
    ignored_dirs.iter().any(|ignored| ignored == name)
}
