//! Command handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use batchwatch_engine::history::HISTORY_FILE_NAME;
use batchwatch_engine::{Engine, HistoryStore, WatchConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::args::{Cli, Command, ConfigArgs, HistoryAction, WatchArgs};
use crate::commands::{ConsoleCommand, HELP, resolve_batch_id};
use crate::console::{ConsoleObserver, render_stats, render_table};
use crate::settings::Settings;

/// Run a parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings_path = match &cli.config {
        Some(path) => path.clone(),
        None => Settings::default_path().context("no config directory on this platform")?,
    };
    let history = history_store(cli.config.as_deref());
    let settings = Settings::load(&settings_path).await;

    match cli.command {
        Command::Watch(args) => watch(settings, history, args).await,
        Command::History { action } => {
            let history = history.context("no config directory for the history file")?;
            edit_history(&history, action.unwrap_or(HistoryAction::List)).await
        }
        Command::Config(args) => show_config(settings, &settings_path, args).await,
    }
}

/// History lives next to the settings file.
fn history_store(settings_path: Option<&Path>) -> Option<HistoryStore> {
    match settings_path {
        Some(path) => Some(HistoryStore::new(path.with_file_name(HISTORY_FILE_NAME))),
        None => HistoryStore::default_location(),
    }
}

async fn watch(
    mut settings: Settings,
    history: Option<HistoryStore>,
    args: WatchArgs,
) -> anyhow::Result<()> {
    settings.apply(&args.overrides);
    let root: PathBuf = args
        .dir
        .or_else(|| settings.watch_folder())
        .context("no folder given and no watch_folder saved")?;

    let history = history.filter(|_| settings.save_history);
    let observer = Arc::new(ConsoleObserver::new(&settings, history.clone()));
    let engine = Engine::builder()
        .with_config(settings.to_watch_config())
        .with_observer(observer)
        .build();

    if let Some(history) = &history {
        match history.load().await {
            Ok(batches) => {
                engine.restore(batches).await;
            }
            Err(e) => warn!("Ignoring unreadable history: {e}"),
        }
    }

    let session = engine
        .start(&root)
        .await
        .with_context(|| format!("failed to watch {}", root.display()))?;
    println!(
        "Watching {} ({} directories). Type `help` for commands.",
        session.root.display(),
        session.watched_directories
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {e}");
                }
                info!("Interrupted");
                break;
            }
            line = lines.next_line(), if stdin_open => {
                match line.context("failed to read stdin")? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        if !handle_line(&engine, &line).await {
                            break;
                        }
                    }
                    None => {
                        info!("stdin closed; press Ctrl-C to stop");
                        stdin_open = false;
                    }
                }
            }
        }
    }

    engine.stop().await;
    Ok(())
}

/// Run one console command. Returns false when the user asked to quit.
async fn handle_line(engine: &Engine, line: &str) -> bool {
    let command = match line.parse::<ConsoleCommand>() {
        Ok(command) => command,
        Err(e) => {
            println!("{e}");
            return true;
        }
    };

    match command {
        ConsoleCommand::List => print!("{}", render_table(&engine.snapshot().await)),
        ConsoleCommand::Sign(prefix) => {
            match resolve_batch_id(&engine.snapshot().await, &prefix) {
                Ok(id) => {
                    if engine.sign_batch(id).await {
                        println!("Signed {}", id.short());
                    } else {
                        println!("Batch {} is not completed", id.short());
                    }
                }
                Err(e) => println!("{e}"),
            }
        }
        ConsoleCommand::SignAll => println!("Signed {} batches", engine.sign_all().await),
        ConsoleCommand::Clear => {
            println!("Removed {} signed batches", engine.clear_signed().await);
        }
        ConsoleCommand::ClearAll => println!("Removed {} batches", engine.clear_all().await),
        ConsoleCommand::Scan => println!("{} batches completed", engine.scan_now().await.len()),
        ConsoleCommand::Stats => println!("{}", render_stats(&engine.stats().await)),
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => return false,
    }

    true
}

/// Apply a history action offline and print the result.
pub async fn edit_history(history: &HistoryStore, action: HistoryAction) -> anyhow::Result<()> {
    let engine = Engine::new(WatchConfig::default());
    let batches = history
        .load()
        .await
        .with_context(|| format!("failed to load {}", history.path().display()))?;
    engine.restore(batches).await;

    let changed = match action {
        HistoryAction::List => {
            print!("{}", render_table(&engine.snapshot().await));
            return Ok(());
        }
        HistoryAction::SignAll => engine.sign_all().await,
        HistoryAction::ClearSigned => engine.clear_signed().await,
        HistoryAction::ClearAll => engine.clear_all().await,
    };

    if changed > 0 {
        history
            .save(&engine.snapshot().await)
            .await
            .with_context(|| format!("failed to write {}", history.path().display()))?;
    }
    println!("{changed} batches updated");
    Ok(())
}

async fn show_config(
    mut settings: Settings,
    settings_path: &Path,
    args: ConfigArgs,
) -> anyhow::Result<()> {
    settings.apply(&args.overrides);
    if let Some(folder) = args.watch_folder {
        settings.watch_folder = folder.display().to_string();
    }

    println!("{}", serde_json::to_string_pretty(&settings)?);

    if args.save {
        settings.save(settings_path).await?;
        println!("Saved to {}", settings_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchwatch_engine::BatchStatus;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_history_next_to_settings() {
        let store = history_store(Some(Path::new("/etc/batchwatch/custom.json"))).unwrap();
        assert_eq!(store.path(), Path::new("/etc/batchwatch/history.json"));
    }

    #[tokio::test]
    async fn test_handle_line_commands() {
        let engine = Engine::new(WatchConfig::default());
        engine.add_file("/up/a.mp4").await;

        assert!(handle_line(&engine, "list").await);
        assert!(handle_line(&engine, "bogus").await);
        assert!(handle_line(&engine, "sign ffff").await);
        assert!(handle_line(&engine, "clear-all").await);
        assert!(engine.snapshot().await.is_empty());
        assert!(!handle_line(&engine, "quit").await);
    }

    #[tokio::test]
    async fn test_edit_history_sign_all() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::new(temp_dir.path().join("history.json"));

        let now = Utc::now();
        let mut completed = batchwatch_engine::Batch::new("/up", now);
        completed.complete(now);
        store.save(std::slice::from_ref(&completed)).await.unwrap();

        edit_history(&store, HistoryAction::SignAll).await.unwrap();

        let saved = store.load().await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, completed.id);
        assert_eq!(saved[0].status, BatchStatus::Signed);

        edit_history(&store, HistoryAction::ClearSigned).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }
}
