//! Error types for the watch engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that can occur in the watch engine.
///
/// Only failures that prevent a watch session from starting, or that break
/// history persistence, surface here. Everything that happens while a session
/// is running is absorbed and logged by the background tasks.
#[derive(Error, Debug)]
pub enum WatchError {
    /// Directory not found.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    /// The watch root exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A session is already active.
    #[error("already watching: {0}")]
    AlreadyWatching(String),

    /// No category or custom extension is enabled.
    #[error("no file extensions enabled")]
    NoExtensionsEnabled,

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// History storage error.
    #[error("history error: {0}")]
    History(String),
}
