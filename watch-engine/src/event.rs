//! File events from native watching.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use notify::event::{ModifyKind, RenameMode};
use serde::{Deserialize, Serialize};

/// A file system event the engine cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEvent {
    /// The kind of event.
    pub kind: FileEventKind,

    /// Path to the affected file or directory.
    pub path: PathBuf,

    /// When the event was received.
    pub timestamp: DateTime<Utc>,
}

impl FileEvent {
    /// Create a new file event.
    pub fn new(kind: FileEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp: Utc::now(),
        }
    }

    /// Translate a native event into zero or more engine events.
    ///
    /// Access and metadata-only changes produce nothing. A rename yields a
    /// `Rename` for the destination and a `Remove` for the source, which no
    /// longer exists on disk.
    pub fn from_notify(event: notify::Event) -> Vec<FileEvent> {
        let Some(kind) = FileEventKind::from_notify(&event.kind) else {
            return Vec::new();
        };

        match event.kind {
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
                .paths
                .into_iter()
                .map(|path| FileEvent::new(FileEventKind::Remove, path))
                .collect(),
            notify::EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut paths = event.paths.into_iter();
                let from = paths.next();
                let to = paths.last();
                from.map(|path| FileEvent::new(FileEventKind::Remove, path))
                    .into_iter()
                    .chain(to.map(|path| FileEvent::new(kind, path)))
                    .collect()
            }
            _ => event
                .paths
                .into_iter()
                .map(|path| FileEvent::new(kind, path))
                .collect(),
        }
    }
}

/// Kind of file event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEventKind {
    /// File or directory was created.
    Create,

    /// File content was written.
    Write,

    /// File was renamed into place.
    Rename,

    /// File or directory was removed. Never batched; only used to forget
    /// watched directories.
    Remove,
}

impl FileEventKind {
    /// Map a native event kind, or `None` for kinds the engine ignores.
    pub fn from_notify(kind: &notify::EventKind) -> Option<Self> {
        match kind {
            notify::EventKind::Create(_) => Some(Self::Create),
            notify::EventKind::Remove(_) => Some(Self::Remove),
            notify::EventKind::Modify(modify_kind) => match modify_kind {
                ModifyKind::Name(_) => Some(Self::Rename),
                ModifyKind::Metadata(_) => None,
                ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other => Some(Self::Write),
            },
            _ => None,
        }
    }
}
