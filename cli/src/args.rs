//! Command line arguments.

use std::path::PathBuf;

use batchwatch_engine::Category;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Detect completed upload batches in a watched folder.
#[derive(Debug, Parser)]
#[command(name = "batchwatch", version, about)]
pub struct Cli {
    /// Settings file. Defaults to `<config dir>/batchwatch/config.json`.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch a folder and report batches as they start and complete.
    Watch(WatchArgs),

    /// Inspect or edit the saved batch history.
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },

    /// Print the effective settings.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Folder to watch. Defaults to the saved `watch_folder`.
    pub dir: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: SettingsOverrides,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Persist the settings after applying overrides.
    #[arg(long)]
    pub save: bool,

    /// Folder to store as `watch_folder`.
    #[arg(long, value_name = "DIR")]
    pub watch_folder: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: SettingsOverrides,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum HistoryAction {
    /// List saved batches.
    List,

    /// Sign every completed batch.
    SignAll,

    /// Remove signed batches.
    ClearSigned,

    /// Remove every batch.
    ClearAll,
}

/// Settings that can be overridden for a single run.
#[derive(Debug, Clone, Default, Args)]
pub struct SettingsOverrides {
    /// Only watch the top level of the folder.
    #[arg(long)]
    pub no_subdirs: bool,

    /// Seconds of inactivity after which a batch is complete.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Extra extensions, comma separated (e.g. "psd,ai").
    #[arg(long, value_name = "LIST")]
    pub ext: Option<String>,

    /// Enable a category.
    #[arg(long, value_enum, value_name = "CATEGORY")]
    pub enable: Vec<CategoryArg>,

    /// Disable a category.
    #[arg(long, value_enum, value_name = "CATEGORY")]
    pub disable: Vec<CategoryArg>,

    /// Do not read or write the batch history.
    #[arg(long)]
    pub no_history: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    Video,
    Image,
    Audio,
    Doc,
    Archive,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Video => Category::Video,
            CategoryArg::Image => Category::Image,
            CategoryArg::Audio => Category::Audio,
            CategoryArg::Doc => Category::Document,
            CategoryArg::Archive => Category::Archive,
        }
    }
}
