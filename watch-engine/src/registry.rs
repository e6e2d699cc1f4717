//! Batch correlation.
//!
//! The `BatchRegistry` owns every batch. File events are folded into the
//! single uploading batch for their folder, or start a new one when that
//! folder has none.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::batch::{Batch, BatchId, BatchStatus};

/// How folder paths are compared when correlating events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderCase {
    /// Exact path equality.
    Sensitive,

    /// Paths equal after lower-casing.
    Insensitive,
}

impl FolderCase {
    /// Insensitive on Windows, sensitive elsewhere.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Self::Insensitive
        } else {
            Self::Sensitive
        }
    }

    /// Correlation key for a folder.
    pub fn key(self, folder: &Path) -> String {
        let display = folder.to_string_lossy();
        match self {
            Self::Sensitive => display.into_owned(),
            Self::Insensitive => display.to_lowercase(),
        }
    }
}

impl Default for FolderCase {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Data handed to completion hooks after the registry lock is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedBatch {
    /// Batch identifier.
    pub id: BatchId,

    /// Batch folder.
    pub folder: PathBuf,

    /// Number of distinct files.
    pub file_count: usize,

    /// Total bytes.
    pub total_size: u64,
}

/// Counts of batches per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// All batches.
    pub total: usize,

    /// Batches still receiving files.
    pub uploading: usize,

    /// Completed batches waiting to be signed.
    pub completed: usize,

    /// Signed batches.
    pub signed: usize,
}

#[derive(Default)]
struct Inner {
    batches: HashMap<BatchId, Batch>,

    /// Folder key to its uploading batch.
    uploading: HashMap<String, BatchId>,
}

/// Concurrent store of in-flight and historical batches.
pub struct BatchRegistry {
    inner: RwLock<Inner>,
    folder_case: FolderCase,
}

impl BatchRegistry {
    /// Create an empty registry using the platform folder case policy.
    pub fn new() -> Self {
        Self::with_folder_case(FolderCase::platform_default())
    }

    /// Create an empty registry with an explicit folder case policy.
    pub fn with_folder_case(folder_case: FolderCase) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            folder_case,
        }
    }

    /// The folder case policy in effect.
    pub fn folder_case(&self) -> FolderCase {
        self.folder_case
    }

    /// Fold a file event into its folder's batch.
    ///
    /// The size is read before the lock is taken. A failed stat (the file was
    /// already moved away) records the name with size zero. Returns whether a
    /// new batch was created.
    pub async fn add_file(&self, path: &Path) -> bool {
        let path: PathBuf = path.components().collect();
        let size = match fs::metadata(&path).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                debug!("Could not stat {}: {e}", path.display());
                0
            }
        };

        self.record_file(&path, size, Utc::now()).await
    }

    /// Fold an observation with a known size and time into its folder's batch.
    pub async fn record_file(&self, path: &Path, size: u64, now: DateTime<Utc>) -> bool {
        let (Some(folder), Some(file_name)) = (path.parent(), path.file_name()) else {
            debug!("Ignoring path without folder or file name: {}", path.display());
            return false;
        };
        let file_name = file_name.to_string_lossy();
        let key = self.folder_case.key(folder);

        let mut inner = self.inner.write().await;
        let Inner { batches, uploading } = &mut *inner;

        let current = uploading.get(&key).copied().filter(|id| {
            batches
                .get(id)
                .is_some_and(|batch| batch.status == BatchStatus::Uploading)
        });

        let (id, is_new_batch) = match current {
            Some(id) => (id, false),
            None => {
                let batch = Batch::new(folder, now);
                let id = batch.id;
                info!("New batch {} for {}", id.short(), folder.display());
                batches.insert(id, batch);
                uploading.insert(key, id);
                (id, true)
            }
        };

        if let Some(batch) = batches.get_mut(&id) {
            batch.record(&file_name, size, now);
        }

        is_new_batch
    }

    /// Sign a completed batch. Uploading and already signed batches are left
    /// alone.
    pub async fn sign_batch(&self, id: BatchId) -> bool {
        let mut inner = self.inner.write().await;
        let signed = inner
            .batches
            .get_mut(&id)
            .is_some_and(|batch| batch.sign(Utc::now()));

        if signed {
            debug!("Signed batch {}", id.short());
        }
        signed
    }

    /// Sign every completed batch. Returns how many were signed.
    pub async fn sign_all(&self) -> usize {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let signed = inner
            .batches
            .values_mut()
            .map(|batch| batch.sign(now))
            .filter(|signed| *signed)
            .count();

        debug!("Signed {signed} batches");
        signed
    }

    /// Remove every signed batch. Returns how many were removed.
    pub async fn clear_signed(&self) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.batches.len();
        inner
            .batches
            .retain(|_, batch| batch.status != BatchStatus::Signed);

        let removed = before - inner.batches.len();
        debug!("Cleared {removed} signed batches");
        removed
    }

    /// Remove every batch, whatever its status. Returns how many were removed.
    pub async fn clear_all(&self) -> usize {
        let mut inner = self.inner.write().await;
        let removed = inner.batches.len();
        inner.batches.clear();
        inner.uploading.clear();

        debug!("Cleared all {removed} batches");
        removed
    }

    /// Batches ordered newest first.
    pub async fn snapshot(&self) -> Vec<Batch> {
        let inner = self.inner.read().await;
        let mut batches: Vec<Batch> = inner.batches.values().cloned().collect();
        batches.sort_by(|a, b| {
            b.start_time
                .cmp(&a.start_time)
                .then_with(|| b.id.cmp(&a.id))
        });
        batches
    }

    /// Look up a batch.
    pub async fn get(&self, id: BatchId) -> Option<Batch> {
        self.inner.read().await.batches.get(&id).cloned()
    }

    /// Number of batches per status.
    pub async fn stats(&self) -> RegistryStats {
        let inner = self.inner.read().await;
        let mut stats = RegistryStats {
            total: inner.batches.len(),
            ..RegistryStats::default()
        };

        for batch in inner.batches.values() {
            match batch.status {
                BatchStatus::Uploading => stats.uploading += 1,
                BatchStatus::Completed => stats.completed += 1,
                BatchStatus::Signed => stats.signed += 1,
            }
        }

        stats
    }

    /// Load batches from history.
    ///
    /// Restored batches that were still uploading are marked completed; the
    /// episode that fed them ended with the previous process. Identifiers
    /// already present are skipped. Returns how many batches were added.
    pub async fn restore(&self, batches: Vec<Batch>) -> usize {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let mut restored = 0;

        for mut batch in batches {
            if inner.batches.contains_key(&batch.id) {
                continue;
            }
            batch.complete(now);
            inner.batches.insert(batch.id, batch);
            restored += 1;
        }

        info!("Restored {restored} batches from history");
        restored
    }

    /// Promote every uploading batch idle for longer than `timeout`.
    ///
    /// Only the status mutation happens under the lock; the returned copies
    /// are used for dispatch afterwards.
    pub async fn promote_stale(
        &self,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Vec<CompletedBatch> {
        let mut inner = self.inner.write().await;
        let Inner { batches, uploading } = &mut *inner;
        let mut completed = Vec::new();

        for batch in batches.values_mut() {
            if batch.status != BatchStatus::Uploading {
                continue;
            }

            let idle_too_long = (now - batch.last_activity)
                .to_std()
                .is_ok_and(|idle| idle > timeout);
            if !idle_too_long || !batch.complete(now) {
                continue;
            }

            uploading.remove(&self.folder_case.key(&batch.folder));
            completed.push(CompletedBatch {
                id: batch.id,
                folder: batch.folder.clone(),
                file_count: batch.file_count(),
                total_size: batch.total_size,
            });
        }

        completed
    }
}

impl Default for BatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}
