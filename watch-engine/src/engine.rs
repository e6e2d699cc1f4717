//! The engine ties classification, correlation and completion together.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::{Batch, BatchId};
use crate::classifier::{
    enabled_extensions, is_ignored_directory, is_in_ignored_dir, is_monitored_file,
};
use crate::config::{TimeoutPolicy, WatchConfig};
use crate::error::{Result, WatchError};
use crate::event::{FileEvent, FileEventKind};
use crate::notifier::{UpdateNotifier, update_channel};
use crate::observer::{BatchObserver, NoopObserver};
use crate::registry::{BatchRegistry, CompletedBatch, FolderCase, RegistryStats};
use crate::scanner::{CompletionScanner, DEFAULT_SCAN_INTERVAL};
use crate::session::WatchSession;

/// Default capacity of the native event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 1000;

/// Details of the running watch session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Watch root.
    pub root: PathBuf,

    /// Whether subdirectories are watched.
    pub recursive: bool,

    /// Directories currently under watch.
    pub watched_directories: usize,

    /// When the session started.
    pub started_at: DateTime<Utc>,
}

/// Handles shared with commands while a session runs.
#[derive(Clone)]
struct LiveSession {
    session: Arc<WatchSession>,
    notifier: UpdateNotifier,
    started_at: DateTime<Utc>,
}

/// Everything needed to tear a session down.
struct RunningSession {
    token: CancellationToken,
    tasks: JoinSet<()>,
    session: Arc<WatchSession>,
}

/// Classify and record file events.
#[derive(Clone)]
struct EventIngest {
    registry: Arc<BatchRegistry>,
    config: Arc<RwLock<WatchConfig>>,
    observer: Arc<dyn BatchObserver>,
}

impl EventIngest {
    /// Record `path` if it passes the classifier. Returns `None` for rejected
    /// paths, otherwise whether a new batch was started.
    async fn ingest(&self, path: &Path, root: Option<&Path>) -> Option<bool> {
        {
            let config = self.config.read().await;
            if !is_monitored_file(path, &config) {
                debug!("Ignoring unmonitored file: {}", path.display());
                return None;
            }

            // Ignored names only apply below the watch root.
            let relative = root.and_then(|root| path.strip_prefix(root).ok());
            if relative.is_some_and(|relative| is_in_ignored_dir(relative, &config)) {
                debug!("Ignoring file in ignored directory: {}", path.display());
                return None;
            }
        }

        let is_new_batch = self.registry.add_file(path).await;
        if is_new_batch
            && let (Some(folder), Some(file_name)) = (path.parent(), path.file_name())
        {
            self.observer
                .on_new_batch_started(folder, &file_name.to_string_lossy())
                .await;
        }

        Some(is_new_batch)
    }

    /// Handle one native event.
    async fn handle_event(
        &self,
        event: FileEvent,
        session: &WatchSession,
        notifier: &UpdateNotifier,
    ) {
        if event.kind == FileEventKind::Remove {
            session.forget_directory(&event.path).await;
            return;
        }

        let is_dir = fs::metadata(&event.path)
            .await
            .is_ok_and(|metadata| metadata.is_dir());

        if is_dir {
            if session.is_recursive() && event.kind != FileEventKind::Write {
                self.watch_new_directory(&event.path, session).await;
            }
            return;
        }

        if self.ingest(&event.path, Some(session.root())).await.is_some() {
            notifier.request();
        }
    }

    async fn watch_new_directory(&self, dir: &Path, session: &WatchSession) {
        let relative = dir.strip_prefix(session.root()).unwrap_or(dir);
        if is_ignored_directory(relative, &*self.config.read().await) {
            debug!("Not watching ignored directory: {}", dir.display());
            return;
        }

        let added = session.add_directory(dir).await;
        if added > 0 {
            info!("Watching {added} new directories under {}", dir.display());
        }
    }
}

/// Drain native events until cancelled or the stream closes.
async fn consume_events(
    mut events: mpsc::Receiver<FileEvent>,
    ingest: EventIngest,
    session: Arc<WatchSession>,
    notifier: UpdateNotifier,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else {
                    debug!("Event stream closed");
                    break;
                };
                ingest.handle_event(event, &session, &notifier).await;
            }
        }
    }

    debug!("Event consumer stopped");
}

/// Upload batch detection engine.
///
/// Owns the batch registry, the live configuration, the observer and at most
/// one watch session. Several engines can coexist in one process.
pub struct Engine {
    ingest: EventIngest,
    scanner: CompletionScanner,
    event_buffer: usize,

    /// Teardown state. Held for the whole of `start` and `stop`.
    running: Mutex<Option<RunningSession>>,

    /// Read by commands to find the current notifier and root.
    live: RwLock<Option<LiveSession>>,
}

impl Engine {
    /// Create a builder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Create an engine with default settings and no observer.
    pub fn new(config: WatchConfig) -> Self {
        Self::builder().with_config(config).build()
    }

    /// Start watching `root`.
    pub async fn start(&self, root: impl AsRef<Path>) -> Result<SessionInfo> {
        let root = root.as_ref();
        let mut running = self.running.lock().await;
        if let Some(active) = running.as_ref() {
            return Err(WatchError::AlreadyWatching(
                active.session.root().display().to_string(),
            ));
        }

        let config = self.ingest.config.read().await.clone();
        if enabled_extensions(&config).is_empty() {
            return Err(WatchError::NoExtensionsEnabled);
        }

        let (event_tx, event_rx) = mpsc::channel(self.event_buffer);
        let session = Arc::new(
            WatchSession::start(
                root,
                config.monitor_subdirs,
                config.ignored_dirs.clone(),
                event_tx,
            )
            .await?,
        );

        let token = CancellationToken::new();
        let (notifier, receiver) = update_channel();
        let mut tasks = JoinSet::new();

        tasks.spawn(consume_events(
            event_rx,
            self.ingest.clone(),
            Arc::clone(&session),
            notifier.clone(),
            token.clone(),
        ));
        tasks.spawn(self.scanner.clone().run(
            Arc::clone(&self.ingest.observer),
            notifier.clone(),
            token.clone(),
        ));
        tasks.spawn(receiver.run(
            Arc::clone(&self.ingest.registry),
            Arc::clone(&self.ingest.observer),
            token.clone(),
        ));

        let started_at = Utc::now();
        let info = SessionInfo {
            root: root.to_path_buf(),
            recursive: session.is_recursive(),
            watched_directories: session.watched_directories().await,
            started_at,
        };

        *self.live.write().await = Some(LiveSession {
            session: Arc::clone(&session),
            notifier: notifier.clone(),
            started_at,
        });
        *running = Some(RunningSession {
            token,
            tasks,
            session,
        });

        info!(
            "Started watching {} ({} directories)",
            info.root.display(),
            info.watched_directories
        );
        notifier.request();

        Ok(info)
    }

    /// Stop the running session.
    ///
    /// Cancels and joins every background task, releases the native watch and
    /// renders the final state once. Returns false when nothing was running.
    pub async fn stop(&self) -> bool {
        let mut running = self.running.lock().await;
        let Some(mut active) = running.take() else {
            return false;
        };

        self.live.write().await.take();
        active.token.cancel();

        while let Some(result) = active.tasks.join_next().await {
            if let Err(e) = result {
                warn!("Background task failed: {e}");
            }
        }

        active.session.stop().await;
        drop(running);

        self.render().await;
        info!("Engine stopped");
        true
    }

    /// Whether a session is running.
    pub async fn is_running(&self) -> bool {
        self.live.read().await.is_some()
    }

    /// Details of the running session.
    pub async fn session(&self) -> Option<SessionInfo> {
        let live = self.live.read().await.clone()?;

        Some(SessionInfo {
            root: live.session.root().to_path_buf(),
            recursive: live.session.is_recursive(),
            watched_directories: live.session.watched_directories().await,
            started_at: live.started_at,
        })
    }

    /// Feed a file path through classification and correlation, as a native
    /// event would. Returns whether a new batch was started.
    pub async fn add_file(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if fs::metadata(path).await.is_ok_and(|metadata| metadata.is_dir()) {
            return false;
        }

        let root = self
            .live
            .read()
            .await
            .as_ref()
            .map(|live| live.session.root().to_path_buf());

        match self.ingest.ingest(path, root.as_deref()).await {
            Some(is_new_batch) => {
                self.refresh().await;
                is_new_batch
            }
            None => false,
        }
    }

    /// Sign a completed batch.
    pub async fn sign_batch(&self, id: BatchId) -> bool {
        let signed = self.ingest.registry.sign_batch(id).await;
        if signed {
            self.refresh().await;
        }
        signed
    }

    /// Sign every completed batch.
    pub async fn sign_all(&self) -> usize {
        let signed = self.ingest.registry.sign_all().await;
        if signed > 0 {
            self.refresh().await;
        }
        signed
    }

    /// Remove every signed batch.
    pub async fn clear_signed(&self) -> usize {
        let removed = self.ingest.registry.clear_signed().await;
        if removed > 0 {
            self.refresh().await;
        }
        removed
    }

    /// Remove every batch.
    pub async fn clear_all(&self) -> usize {
        let removed = self.ingest.registry.clear_all().await;
        if removed > 0 {
            self.refresh().await;
        }
        removed
    }

    /// Batches ordered newest first.
    pub async fn snapshot(&self) -> Vec<Batch> {
        self.ingest.registry.snapshot().await
    }

    /// Look up a batch.
    pub async fn batch(&self, id: BatchId) -> Option<Batch> {
        self.ingest.registry.get(id).await
    }

    /// Batch counts per status.
    pub async fn stats(&self) -> RegistryStats {
        self.ingest.registry.stats().await
    }

    /// Current configuration.
    pub async fn config(&self) -> WatchConfig {
        self.ingest.config.read().await.clone()
    }

    /// Replace the configuration.
    ///
    /// Category, extension and timeout changes apply to the next event or
    /// scan. Subdirectory and ignored-directory changes apply from the next
    /// `start`.
    pub async fn set_config(&self, config: WatchConfig) {
        *self.ingest.config.write().await = config;
        debug!("Configuration updated");
    }

    /// Run a completion scan now instead of waiting for the next tick.
    pub async fn scan_now(&self) -> Vec<CompletedBatch> {
        self.scan_at(Utc::now()).await
    }

    /// Run a completion scan as of `now`.
    pub async fn scan_at(&self, now: DateTime<Utc>) -> Vec<CompletedBatch> {
        let completed = self.scanner.scan_at(now).await;
        for batch in &completed {
            self.ingest.observer.on_batch_completed(batch).await;
        }

        if !completed.is_empty() {
            self.refresh().await;
        }
        completed
    }

    /// Load batches from history.
    pub async fn restore(&self, batches: Vec<Batch>) -> usize {
        let restored = self.ingest.registry.restore(batches).await;
        if restored > 0 {
            self.refresh().await;
        }
        restored
    }

    /// Ask for a redraw: through the coalescing notifier while a session
    /// runs, directly otherwise.
    async fn refresh(&self) {
        let notifier = self
            .live
            .read()
            .await
            .as_ref()
            .map(|live| live.notifier.clone());

        match notifier {
            Some(notifier) => {
                notifier.request();
            }
            None => self.render().await,
        }
    }

    async fn render(&self) {
        let snapshot = self.ingest.registry.snapshot().await;
        self.ingest.observer.on_state_changed(&snapshot).await;
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    config: WatchConfig,
    observer: Arc<dyn BatchObserver>,
    scan_interval: Duration,
    timeout_policy: TimeoutPolicy,
    folder_case: FolderCase,
    event_buffer: usize,
}

impl EngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: WatchConfig::default(),
            observer: Arc::new(NoopObserver),
            scan_interval: DEFAULT_SCAN_INTERVAL,
            timeout_policy: TimeoutPolicy::default(),
            folder_case: FolderCase::platform_default(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Set the initial configuration.
    pub fn with_config(mut self, config: WatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the observer.
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Set the time between completion scans.
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Set how the configured timeout is clamped.
    pub fn with_timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.timeout_policy = policy;
        self
    }

    /// Set the folder comparison policy.
    pub fn with_folder_case(mut self, folder_case: FolderCase) -> Self {
        self.folder_case = folder_case;
        self
    }

    /// Set the native event channel capacity. Clamped to at least one.
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    /// Build the engine.
    pub fn build(self) -> Engine {
        let registry = Arc::new(BatchRegistry::with_folder_case(self.folder_case));
        let config = Arc::new(RwLock::new(self.config));
        let scanner = CompletionScanner::new(
            Arc::clone(&registry),
            Arc::clone(&config),
            self.timeout_policy,
            self.scan_interval,
        );

        Engine {
            ingest: EventIngest {
                registry,
                config,
                observer: self.observer,
            },
            scanner,
            event_buffer: self.event_buffer,
            running: Mutex::new(None),
            live: RwLock::new(None),
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
