//! # Batch Watch Engine
//!
//! This crate infers upload batches from raw file system events. It watches a
//! directory tree and decides, without any cooperation from the uploading
//! process, when a batch of files landing in one folder has started and when
//! it has finished.
//!
//! ## Features
//!
//! - **Classification**: Content categories, custom extensions, temporary
//!   artifacts and ignored directories
//! - **Correlation**: One uploading batch per folder at a time
//! - **Completion**: Batches complete after a period of inactivity
//! - **Coalesced Updates**: Bursts of events produce a single redraw
//! - **History**: Batch list persisted as JSON
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           Engine                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  WatchSession ──► FileEvent ──► Classifier ──► BatchRegistry    │
//! │                                                   │     ▲       │
//! │                                                   ▼     │       │
//! │  BatchObserver ◄── UpdateNotifier ◄──────── CompletionScanner   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use batchwatch_engine::{Engine, WatchConfig};
//!
//! # async fn run() -> batchwatch_engine::Result<()> {
//! let engine = Engine::new(WatchConfig::default());
//! engine.start("/srv/uploads").await?;
//! // ...
//! engine.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod history;
pub mod notifier;
pub mod observer;
pub mod registry;
pub mod scanner;
pub mod session;

pub use batch::{Batch, BatchId, BatchStatus, format_size};
pub use config::{Category, TimeoutPolicy, WatchConfig};
pub use engine::{Engine, EngineBuilder, SessionInfo};
pub use error::{Result, WatchError};
pub use event::{FileEvent, FileEventKind};
pub use history::HistoryStore;
pub use observer::{BatchObserver, NoopObserver};
pub use registry::{BatchRegistry, CompletedBatch, FolderCase, RegistryStats};
pub use scanner::CompletionScanner;
pub use session::WatchSession;
