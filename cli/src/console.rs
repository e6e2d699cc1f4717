//! Terminal rendering and notifications.

use std::fmt::Write as _;
use std::path::Path;

use async_trait::async_trait;
use batchwatch_engine::{
    Batch, BatchObserver, CompletedBatch, HistoryStore, RegistryStats, format_size,
};
use chrono::Local;
use tracing::{debug, warn};

use crate::settings::Settings;

/// Observer that prints notifications and keeps the history file current.
pub struct ConsoleObserver {
    notify_on_start: bool,
    notify_on_complete: bool,
    history: Option<HistoryStore>,
}

impl ConsoleObserver {
    /// Build from settings. `history` is written on every state change.
    pub fn new(settings: &Settings, history: Option<HistoryStore>) -> Self {
        Self {
            notify_on_start: settings.notify_on_start,
            notify_on_complete: settings.notify_on_complete,
            history,
        }
    }
}

#[async_trait]
impl BatchObserver for ConsoleObserver {
    async fn on_new_batch_started(&self, folder: &Path, first_file: &str) {
        if self.notify_on_start {
            println!("New upload in {}: {first_file}", folder.display());
        }
    }

    async fn on_batch_completed(&self, batch: &CompletedBatch) {
        if self.notify_on_complete {
            println!(
                "Upload complete in {}: {} files, {}",
                batch.folder.display(),
                batch.file_count,
                format_size(batch.total_size)
            );
        }
    }

    async fn on_state_changed(&self, snapshot: &[Batch]) {
        let Some(history) = &self.history else {
            return;
        };

        match history.save(snapshot).await {
            Ok(()) => debug!("History updated ({} batches)", snapshot.len()),
            Err(e) => warn!("Failed to save history: {e}"),
        }
    }
}

/// Render batches as a table, newest first as given.
pub fn render_table(batches: &[Batch]) -> String {
    if batches.is_empty() {
        return "No batches.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10} {:<10} {:>6} {:>10}  {:<19}  FOLDER",
        "ID", "STATUS", "FILES", "SIZE", "STARTED"
    );

    for batch in batches {
        let started = batch.start_time.with_timezone(&Local);
        let _ = writeln!(
            out,
            "{:<10} {:<10} {:>6} {:>10}  {:<19}  {}",
            batch.id.short(),
            batch.status.label(),
            batch.file_count(),
            format_size(batch.total_size),
            started.format("%Y-%m-%d %H:%M:%S"),
            batch.folder.display()
        );
    }

    out
}

/// One line summary of batch counts.
pub fn render_stats(stats: &RegistryStats) -> String {
    format!(
        "{} batches: {} uploading, {} unsigned, {} signed",
        stats.total, stats.uploading, stats.completed, stats.signed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_table() {
        assert_eq!(render_table(&[]), "No batches.\n");
    }

    #[test]
    fn test_table_rows() {
        let now = Utc::now();
        let mut batch = Batch::new("/srv/uploads/client-a", now);
        batch.record("a.mp4", 1536, now);
        batch.complete(now);

        let table = render_table(std::slice::from_ref(&batch));
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].starts_with(&batch.id.short()));
        assert!(lines[1].contains("completed"));
        assert!(lines[1].contains("1.5 KB"));
        assert!(lines[1].ends_with("/srv/uploads/client-a"));
    }

    #[test]
    fn test_stats_line() {
        let stats = RegistryStats {
            total: 4,
            uploading: 1,
            completed: 2,
            signed: 1,
        };

        assert_eq!(
            render_stats(&stats),
            "4 batches: 1 uploading, 2 unsigned, 1 signed"
        );
    }

    #[tokio::test]
    async fn test_observer_writes_history() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let store = HistoryStore::new(temp_dir.path().join("history.json"));
        let observer = ConsoleObserver::new(&Settings::default(), Some(store.clone()));

        let batch = Batch::new("/up", Utc::now());
        observer.on_state_changed(std::slice::from_ref(&batch)).await;

        assert_eq!(store.load().await.unwrap(), vec![batch]);
    }
}
