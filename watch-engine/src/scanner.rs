//! Inactivity-based completion detection.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{TimeoutPolicy, WatchConfig};
use crate::notifier::UpdateNotifier;
use crate::observer::BatchObserver;
use crate::registry::{BatchRegistry, CompletedBatch};

/// Default time between scans.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(3);

/// Periodic sweep promoting idle uploading batches to completed.
#[derive(Clone)]
pub struct CompletionScanner {
    registry: Arc<BatchRegistry>,
    config: Arc<RwLock<WatchConfig>>,
    policy: TimeoutPolicy,
    interval: Duration,
}

impl CompletionScanner {
    /// Create a scanner over `registry` reading the timeout from `config`.
    pub fn new(
        registry: Arc<BatchRegistry>,
        config: Arc<RwLock<WatchConfig>>,
        policy: TimeoutPolicy,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            config,
            policy,
            interval,
        }
    }

    /// Timeout currently in effect.
    pub async fn timeout(&self) -> Duration {
        let configured = self.config.read().await.completion_timeout_secs;
        self.policy.effective(configured)
    }

    /// Run one scan as of `now`. Returns the batches promoted by this call.
    pub async fn scan_at(&self, now: DateTime<Utc>) -> Vec<CompletedBatch> {
        let timeout = self.timeout().await;
        let completed = self.registry.promote_stale(now, timeout).await;

        for batch in &completed {
            info!(
                "Batch {} completed: {} files in {}",
                batch.id.short(),
                batch.file_count,
                batch.folder.display()
            );
        }

        completed
    }

    /// Scan on every tick until cancelled, dispatching completions after the
    /// registry lock is released.
    pub async fn run(
        self,
        observer: Arc<dyn BatchObserver>,
        notifier: UpdateNotifier,
        token: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let completed = self.scan_at(Utc::now()).await;
                    if completed.is_empty() {
                        continue;
                    }

                    for batch in &completed {
                        observer.on_batch_completed(batch).await;
                    }
                    notifier.request();
                }
            }
        }

        debug!("Completion scanner stopped");
    }
}
