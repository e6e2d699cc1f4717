//! Batch history persistence.
//!
//! The batch list is stored as a single JSON array so that completed and
//! signed batches survive a restart.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::batch::Batch;
use crate::error::{Result, WatchError};

/// File name of the history file.
pub const HISTORY_FILE_NAME: &str = "history.json";

/// Directory under the user config directory holding batchwatch state.
pub const APP_DIR_NAME: &str = "batchwatch";

/// JSON file holding the batch list.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config_dir>/batchwatch/history.json`, if the platform has a config
    /// directory.
    pub fn default_location() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::new(dir.join(APP_DIR_NAME).join(HISTORY_FILE_NAME)))
    }

    /// Path of the history file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved batches. A missing file is an empty history.
    pub async fn load(&self) -> Result<Vec<Batch>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No history at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(WatchError::History(format!("{}: {e}", self.path.display())));
            }
        };

        let batches: Vec<Batch> = serde_json::from_str(&content)?;
        info!("Loaded {} batches from {}", batches.len(), self.path.display());
        Ok(batches)
    }

    /// Replace the saved batches.
    pub async fn save(&self, batches: &[Batch]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| WatchError::History(format!("{}: {e}", parent.display())))?;
        }

        let content = serde_json::to_string_pretty(batches)?;

        // Write atomically using a temp file
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| WatchError::History(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| WatchError::History(format!("{}: {e}", self.path.display())))?;

        debug!("Saved {} batches to {}", batches.len(), self.path.display());
        Ok(())
    }
}
