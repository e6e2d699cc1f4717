//! Native directory watching.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::fs;
use tokio::sync::{Mutex, mpsc};
use tokio::task;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::classifier::is_ignored_dir_name;
use crate::error::{Result, WatchError};
use crate::event::FileEvent;

struct NativeWatch {
    watcher: RecommendedWatcher,
    directories: HashSet<PathBuf>,
}

/// One run of native monitoring, from `start` to `stop`.
///
/// Every directory is registered with its own non-recursive watch so that
/// ignored directories never produce events.
pub struct WatchSession {
    root: PathBuf,
    recursive: bool,
    ignored_dirs: Vec<String>,
    native: Mutex<Option<NativeWatch>>,
}

impl WatchSession {
    /// Watch `root`, forwarding mapped events into `sink`.
    ///
    /// Failing to watch the root is an error. When `recursive`, every
    /// directory below the root that is not ignored is added as well;
    /// failures there are logged and skipped.
    pub async fn start(
        root: &Path,
        recursive: bool,
        ignored_dirs: Vec<String>,
        sink: mpsc::Sender<FileEvent>,
    ) -> Result<Self> {
        match fs::metadata(root).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(WatchError::NotADirectory(root.display().to_string())),
            Err(_) => return Err(WatchError::DirectoryNotFound(root.display().to_string())),
        }

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    for file_event in FileEvent::from_notify(event) {
                        if sink.blocking_send(file_event).is_err() {
                            debug!("Event receiver closed, dropping event");
                            return;
                        }
                    }
                }
                Err(e) => {
                    error!("Watch error: {e}");
                }
            },
        )?;

        watcher.watch(root, RecursiveMode::NonRecursive)?;
        info!("Watching directory: {}", root.display());

        let mut directories = HashSet::new();
        directories.insert(root.to_path_buf());

        let session = Self {
            root: root.to_path_buf(),
            recursive,
            ignored_dirs,
            native: Mutex::new(Some(NativeWatch {
                watcher,
                directories,
            })),
        };

        if recursive {
            let added = session.add_directory(root).await;
            debug!("Added {added} subdirectories under {}", root.display());
        }

        Ok(session)
    }

    /// Watch root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether subdirectories are watched.
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Add `dir` and every non-ignored directory already inside it.
    ///
    /// Returns how many directories were newly registered. Directories that
    /// are already watched are skipped, so this is safe to call again for the
    /// same tree.
    pub async fn add_directory(&self, dir: &Path) -> usize {
        let found = walk_directories(dir, &self.ignored_dirs).await;

        let mut native = self.native.lock().await;
        let Some(native) = native.as_mut() else {
            return 0;
        };

        let mut added = 0;
        for path in found {
            if native.directories.contains(&path) {
                continue;
            }

            match native.watcher.watch(&path, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    debug!("Started watching: {}", path.display());
                    native.directories.insert(path);
                    added += 1;
                }
                Err(e) => warn!("Failed to watch {}: {e}", path.display()),
            }
        }

        added
    }

    /// Drop `path` and everything below it from the watched set.
    ///
    /// The platform watch is already gone once a directory is deleted, so
    /// nothing is unwatched here. A directory created again at the same path
    /// is picked up by the next `add_directory`.
    pub async fn forget_directory(&self, path: &Path) -> usize {
        let mut native = self.native.lock().await;
        let Some(native) = native.as_mut() else {
            return 0;
        };

        let before = native.directories.len();
        native.directories.retain(|dir| !dir.starts_with(path));
        let removed = before - native.directories.len();
        if removed > 0 {
            debug!("Forgot {removed} removed directories under {}", path.display());
        }
        removed
    }

    /// Number of directories under watch. Zero once stopped.
    pub async fn watched_directories(&self) -> usize {
        self.native
            .lock()
            .await
            .as_ref()
            .map_or(0, |native| native.directories.len())
    }

    /// Whether the native watch is still held.
    pub async fn is_active(&self) -> bool {
        self.native.lock().await.is_some()
    }

    /// Release the native watch. Returns false if it was already released.
    pub async fn stop(&self) -> bool {
        let Some(mut native) = self.native.lock().await.take() else {
            return false;
        };

        for path in &native.directories {
            if let Err(e) = native.watcher.unwatch(path) {
                debug!("Failed to unwatch {}: {e}", path.display());
            }
        }

        info!("Stopped watching: {}", self.root.display());
        true
    }
}

/// Every directory at or below `dir`, skipping ignored names. Runs on the
/// blocking pool.
async fn walk_directories(dir: &Path, ignored_dirs: &[String]) -> Vec<PathBuf> {
    let dir = dir.to_path_buf();
    let ignored_dirs = ignored_dirs.to_vec();

    let walk = task::spawn_blocking(move || {
        WalkDir::new(&dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !is_ignored_dir_name(&name, &ignored_dirs)
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Failed to read directory entry: {e}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_dir())
            .map(walkdir::DirEntry::into_path)
            .collect::<Vec<_>>()
    });

    match walk.await {
        Ok(found) => found,
        Err(e) => {
            warn!("Directory walk failed: {e}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn ignored() -> Vec<String> {
        vec!["node_modules".to_string(), ".git".to_string()]
    }

    #[tokio::test]
    async fn test_start_nonexistent_root() {
        let (tx, _rx) = mpsc::channel(16);
        let root = Path::new("/nonexistent/path/12345");
        let result = WatchSession::start(root, true, ignored(), tx).await;

        assert!(matches!(result, Err(WatchError::DirectoryNotFound(_))));
    }

    #[tokio::test]
    async fn test_start_on_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file.mp4");
        std::fs::write(&file, b"x").unwrap();

        let (tx, _rx) = mpsc::channel(16);
        let result = WatchSession::start(&file, true, ignored(), tx).await;

        assert!(matches!(result, Err(WatchError::NotADirectory(_))));
    }

    #[tokio::test]
    async fn test_recursive_walk_skips_ignored() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("a/b")).unwrap();
        std::fs::create_dir_all(temp_dir.path().join("node_modules/pkg")).unwrap();
        std::fs::create_dir_all(temp_dir.path().join(".git/objects")).unwrap();

        let (tx, _rx) = mpsc::channel(16);
        let session = WatchSession::start(temp_dir.path(), true, ignored(), tx)
            .await
            .unwrap();

        // root, a, a/b
        assert_eq!(session.watched_directories().await, 3);
        session.stop().await;
    }

    #[tokio::test]
    async fn test_non_recursive_watches_root_only() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("a/b")).unwrap();

        let (tx, _rx) = mpsc::channel(16);
        let session = WatchSession::start(temp_dir.path(), false, ignored(), tx)
            .await
            .unwrap();

        assert_eq!(session.watched_directories().await, 1);
        assert!(!session.is_recursive());
        session.stop().await;
    }

    #[tokio::test]
    async fn test_add_directory_is_incremental() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::channel(16);
        let session = WatchSession::start(temp_dir.path(), true, ignored(), tx)
            .await
            .unwrap();

        let created = temp_dir.path().join("incoming");
        std::fs::create_dir_all(created.join("nested")).unwrap();

        assert_eq!(session.add_directory(&created).await, 2);
        assert_eq!(session.add_directory(&created).await, 0);
        assert_eq!(session.watched_directories().await, 3);
        session.stop().await;
    }

    #[tokio::test]
    async fn test_forget_directory_allows_rewatch() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::channel(16);
        let session = WatchSession::start(temp_dir.path(), true, ignored(), tx)
            .await
            .unwrap();

        let created = temp_dir.path().join("incoming");
        std::fs::create_dir_all(created.join("nested")).unwrap();
        assert_eq!(session.add_directory(&created).await, 2);

        std::fs::remove_dir_all(&created).unwrap();
        assert_eq!(session.forget_directory(&created).await, 2);
        assert_eq!(session.watched_directories().await, 1);

        std::fs::create_dir(&created).unwrap();
        assert_eq!(session.add_directory(&created).await, 1);
        assert_eq!(session.watched_directories().await, 2);
        session.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::channel(16);
        let session = WatchSession::start(temp_dir.path(), true, ignored(), tx)
            .await
            .unwrap();

        assert!(session.is_active().await);
        assert!(session.stop().await);
        assert!(!session.stop().await);
        assert!(!session.is_active().await);
        assert_eq!(session.watched_directories().await, 0);
        assert_eq!(session.add_directory(temp_dir.path()).await, 0);
    }
}
