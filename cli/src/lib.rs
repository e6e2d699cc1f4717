//! # Batch Watch CLI
//!
//! Terminal front end for `batchwatch-engine`. Owns the persisted settings
//! and the batch history file, prints notifications, and reads interactive
//! commands while a folder is being watched.

pub mod app;
pub mod args;
pub mod commands;
pub mod console;
pub mod settings;

pub use app::run;
pub use args::Cli;
pub use settings::Settings;
