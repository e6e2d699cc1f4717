//! End-to-end tests for the offline commands.

use std::path::Path;

use batchwatch_cli::{Cli, Settings, run};
use batchwatch_engine::{Batch, BatchStatus, HistoryStore};
use chrono::Utc;
use clap::Parser;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_test::assert_ok;

fn cli(config: &Path, args: &[&str]) -> Cli {
    let config = config.to_string_lossy().into_owned();
    let mut argv = vec!["batchwatch", "--config", config.as_str()];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

#[tokio::test]
async fn test_config_save_persists_overrides() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");

    assert_ok!(
        run(cli(
            &path,
            &[
                "config",
                "--save",
                "--watch-folder",
                "/srv/uploads",
                "--enable",
                "archive",
                "--timeout",
                "120",
            ],
        ))
        .await
    );

    let settings = Settings::load(&path).await;
    assert_eq!(settings.watch_folder, "/srv/uploads");
    assert!(settings.archive_enabled);
    assert!(settings.video_enabled);
    assert_eq!(settings.completion_timeout, 120);
}

#[tokio::test]
async fn test_config_without_save_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");

    assert_ok!(run(cli(&path, &["config", "--timeout", "5"])).await);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_history_commands() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    let store = HistoryStore::new(temp_dir.path().join("history.json"));

    // Nothing saved yet.
    assert_ok!(run(cli(&path, &["history"])).await);

    let now = Utc::now();
    let mut completed = Batch::new("/up/a", now);
    completed.complete(now);
    let uploading = Batch::new("/up/b", now);
    assert_ok!(store.save(&[completed, uploading]).await);

    assert_ok!(run(cli(&path, &["history", "sign-all"])).await);

    // The uploading batch is restored as completed, so both get signed.
    let saved = assert_ok!(store.load().await);
    assert_eq!(saved.len(), 2);
    assert!(saved.iter().all(|b| b.status == BatchStatus::Signed));

    assert_ok!(run(cli(&path, &["history", "clear-signed"])).await);
    assert!(assert_ok!(store.load().await).is_empty());
}

#[tokio::test]
async fn test_watch_requires_folder() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");

    let err = run(cli(&path, &["watch", "--no-history"])).await.unwrap_err();
    assert!(err.to_string().contains("no folder given"));
}
