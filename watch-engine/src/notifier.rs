//! Coalesced state-change notifications.
//!
//! Requests go into a channel with room for one pending signal. While one is
//! pending further requests are dropped, so a burst of file events produces a
//! single redraw.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::observer::BatchObserver;
use crate::registry::BatchRegistry;

/// Cheap handle used to ask for a state-change notification.
#[derive(Debug, Clone)]
pub struct UpdateNotifier {
    tx: mpsc::Sender<()>,
}

/// Receiving side; drained by a single task.
pub struct UpdateReceiver {
    rx: mpsc::Receiver<()>,
}

/// Create a connected notifier pair.
pub fn update_channel() -> (UpdateNotifier, UpdateReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (UpdateNotifier { tx }, UpdateReceiver { rx })
}

impl UpdateNotifier {
    /// Request a notification. Never blocks. Returns whether a new signal was
    /// queued; `false` means one was already pending or the receiver is gone.
    pub fn request(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

impl UpdateReceiver {
    /// Wait for the next pending signal. `None` once every notifier is gone.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    /// Deliver a fresh snapshot to `observer` for every signal until
    /// cancelled.
    pub async fn run(
        mut self,
        registry: Arc<BatchRegistry>,
        observer: Arc<dyn BatchObserver>,
        token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                signal = self.rx.recv() => {
                    if signal.is_none() {
                        break;
                    }
                    let snapshot = registry.snapshot().await;
                    observer.on_state_changed(&snapshot).await;
                }
            }
        }

        debug!("Update notifier stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::batch::Batch;

    #[derive(Default)]
    struct CountingObserver {
        changes: AtomicUsize,
        last_len: AtomicUsize,
    }

    #[async_trait]
    impl BatchObserver for CountingObserver {
        async fn on_state_changed(&self, snapshot: &[Batch]) {
            self.last_len.store(snapshot.len(), Ordering::SeqCst);
            self.changes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_burst_is_coalesced() {
        let (notifier, mut receiver) = update_channel();

        assert!(notifier.request());
        for _ in 0..100 {
            assert!(!notifier.request());
        }

        assert_eq!(receiver.recv().await, Some(()));
        assert!(receiver.rx.try_recv().is_err());

        // Drained, so the next request queues again.
        assert!(notifier.request());
    }

    #[tokio::test]
    async fn test_request_after_receiver_dropped() {
        let (notifier, receiver) = update_channel();
        drop(receiver);
        assert!(!notifier.request());
    }

    #[tokio::test]
    async fn test_run_delivers_snapshots() {
        let registry = Arc::new(BatchRegistry::new());
        registry
            .record_file(Path::new("/up/a.mp4"), 1, Utc::now())
            .await;

        let observer = Arc::new(CountingObserver::default());
        let token = CancellationToken::new();
        let (notifier, receiver) = update_channel();

        let task = tokio::spawn(receiver.run(
            Arc::clone(&registry),
            observer.clone(),
            token.clone(),
        ));

        notifier.request();
        for _ in 0..50 {
            if observer.changes.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(observer.changes.load(Ordering::SeqCst) >= 1);
        assert_eq!(observer.last_len.load(Ordering::SeqCst), 1);

        token.cancel();
        task.await.unwrap();
    }
}
