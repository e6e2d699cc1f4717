//! Upload batches and their status lifecycle.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique batch identifier.
///
/// UUID v7, so identifiers created later in a process sort later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub Uuid);

impl BatchId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// First eight hex digits, for display.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a batch. Only ever advances in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Files are still arriving.
    Uploading,

    /// No activity for longer than the completion timeout.
    Completed,

    /// Acknowledged by the user.
    Signed,
}

impl BatchStatus {
    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Signed => "signed",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Files observed arriving in one folder during one upload episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Unique identifier.
    pub id: BatchId,

    /// Common parent directory of every file in the batch.
    pub folder: PathBuf,

    /// Distinct file names in arrival order.
    pub files: Vec<String>,

    /// Largest observed size per file name.
    pub file_sizes: HashMap<String, u64>,

    /// Sum of `file_sizes`.
    pub total_size: u64,

    /// Current status.
    pub status: BatchStatus,

    /// When the first file was seen.
    pub start_time: DateTime<Utc>,

    /// When the most recent accepted event arrived.
    pub last_activity: DateTime<Utc>,

    /// When the batch was promoted to completed.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// When the batch was signed.
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
}

impl Batch {
    /// Create an empty uploading batch.
    pub fn new(folder: impl Into<PathBuf>, now: DateTime<Utc>) -> Self {
        Self {
            id: BatchId::new(),
            folder: folder.into(),
            files: Vec::new(),
            file_sizes: HashMap::new(),
            total_size: 0,
            status: BatchStatus::Uploading,
            start_time: now,
            last_activity: now,
            completed_at: None,
            signed_at: None,
        }
    }

    /// Number of distinct files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Last component of the folder, for display.
    pub fn folder_name(&self) -> String {
        self.folder
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.folder.display().to_string())
    }

    /// Record an observation of `file_name` with `size` bytes.
    ///
    /// Names are appended once. A smaller size than previously seen is
    /// ignored; uploads only grow on disk.
    pub fn record(&mut self, file_name: &str, size: u64, now: DateTime<Utc>) {
        if !self.files.iter().any(|f| f == file_name) {
            self.files.push(file_name.to_string());
        }

        let previous = self.file_sizes.get(file_name).copied().unwrap_or(0);
        if size > previous {
            self.total_size += size - previous;
            self.file_sizes.insert(file_name.to_string(), size);
        } else {
            self.file_sizes.entry(file_name.to_string()).or_insert(previous);
        }

        self.last_activity = now;
    }

    /// `Uploading → Completed`. Returns false for any other status.
    pub fn complete(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != BatchStatus::Uploading {
            return false;
        }
        self.status = BatchStatus::Completed;
        self.completed_at = Some(now);
        true
    }

    /// `Completed → Signed`. Returns false for any other status.
    pub fn sign(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != BatchStatus::Completed {
            return false;
        }
        self.status = BatchStatus::Signed;
        self.signed_at = Some(now);
        true
    }
}

/// Format a byte count with base-1024 units: `0 B`, `1.5 KB`, `1.0 GB`.
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const PREFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{bytes} B");
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}B", bytes as f64 / div as f64, PREFIXES[exp])
}
