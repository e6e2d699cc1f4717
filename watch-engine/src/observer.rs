//! Hooks from the engine to the presentation layer.

use std::path::Path;

use async_trait::async_trait;

use crate::batch::Batch;
use crate::registry::CompletedBatch;

/// Receives batch notifications.
///
/// Hooks are never invoked while the registry lock is held, so an
/// implementation may call back into the engine.
#[async_trait]
pub trait BatchObserver: Send + Sync {
    /// A file event created a new batch in `folder`.
    async fn on_new_batch_started(&self, _folder: &Path, _first_file: &str) {}

    /// A batch was promoted to completed.
    async fn on_batch_completed(&self, _batch: &CompletedBatch) {}

    /// Batch state changed. `snapshot` is ordered newest first.
    async fn on_state_changed(&self, _snapshot: &[Batch]) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

#[async_trait]
impl BatchObserver for NoopObserver {}
