//! Configuration File Watcher
//!
//! Watches config files for changes and invokes a callback per file. The
//! parent directory of each file is watched (watching the file directly is
//! unreliable across editors that replace files on save) and events are
//! filtered down to registered files.
//!
//! One dispatch task per watcher consumes the events, so callbacks never run
//! concurrently with each other. `close` stops that task and waits for it
//! before releasing the underlying watch handles.

use crate::contract::{ChangeCallback, Watcher};
use crate::error::ConfigError;
use crate::Result;
use async_trait::async_trait;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

type EventReceiver = mpsc::UnboundedReceiver<notify::Result<Event>>;

struct Backend {
    watcher: RecommendedWatcher,
    events: Option<EventReceiver>,
    dirs: HashSet<PathBuf>,
}

impl Backend {
    fn new() -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // receiver gone means the watcher is shutting down
                let _ = tx.send(res);
            },
            NotifyConfig::default(),
        )
        .map_err(|source| ConfigError::Watch { path: None, source })?;

        Ok(Self {
            watcher,
            events: Some(rx),
            dirs: HashSet::new(),
        })
    }

    fn watch_dir(&mut self, dir: &Path) -> Result<()> {
        if self.dirs.contains(dir) {
            return Ok(());
        }
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| ConfigError::Watch {
                path: Some(dir.to_path_buf()),
                source,
            })?;
        self.dirs.insert(dir.to_path_buf());
        info!("Started watching configuration directory: {}", dir.display());
        Ok(())
    }
}

struct Dispatch {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct WatchState {
    backend: Option<Backend>,
    files: HashMap<PathBuf, ChangeCallback>,
    dispatch: Option<Dispatch>,
}

/// [`Watcher`] backed by the platform's file notification facility
pub struct FileWatcher {
    state: Arc<Mutex<WatchState>>,
    settle_delay: Duration,
}

impl Default for FileWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FileWatcher {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(WatchState::default())),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Wait this long after a change before invoking callbacks, so the writer
    /// has a chance to finish
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Files currently registered, sorted
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.state.lock().files.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().dispatch.is_some()
    }

    /// Start the dispatch task if it is not running yet. Caller holds the lock.
    fn start_locked(&self, state: &mut WatchState, runtime: &Handle) {
        if state.dispatch.is_some() {
            return;
        }
        let Some(events) = state.backend.as_mut().and_then(|b| b.events.take()) else {
            return;
        };

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = runtime.spawn(run(
            events,
            shutdown_rx,
            Arc::downgrade(&self.state),
            self.settle_delay,
        ));
        state.dispatch = Some(Dispatch { shutdown, handle });
        debug!("File watcher dispatch loop started");
    }
}

async fn run(
    mut events: EventReceiver,
    mut shutdown: oneshot::Receiver<()>,
    state: Weak<Mutex<WatchState>>,
    settle_delay: Duration,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Some(Ok(event)) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        debug!("Ignoring file event type: {:?}", event.kind);
                        continue;
                    }
                    let callbacks = match state.upgrade() {
                        Some(state) => callbacks_for(&state, &event.paths),
                        None => break,
                    };
                    if callbacks.is_empty() {
                        continue;
                    }
                    if !settle_delay.is_zero() {
                        tokio::time::sleep(settle_delay).await;
                    }
                    for callback in callbacks {
                        callback();
                    }
                }
                Some(Err(e)) => warn!("File watcher error: {}", e),
                None => break,
            }
        }
    }
    debug!("File watcher dispatch loop stopped");
}

fn callbacks_for(state: &Mutex<WatchState>, paths: &[PathBuf]) -> Vec<ChangeCallback> {
    let state = state.lock();
    paths
        .iter()
        .filter_map(|path| {
            let callback = state.files.get(path)?;
            debug!("Configuration file changed: {}", path.display());
            Some(callback.clone())
        })
        .collect()
}

#[async_trait]
impl Watcher for FileWatcher {
    fn add_file(&self, path: &Path, callback: ChangeCallback) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        let path = std::fs::canonicalize(path).map_err(|e| ConfigError::Watch {
            path: Some(path.to_path_buf()),
            source: notify::Error::io(e),
        })?;
        let dir = path.parent().ok_or_else(|| ConfigError::Watch {
            path: Some(path.clone()),
            source: notify::Error::generic("file has no parent directory"),
        })?;

        let mut state = self.state.lock();
        let mut backend = match state.backend.take() {
            Some(backend) => backend,
            None => Backend::new()?,
        };
        let watched = backend.watch_dir(dir);
        state.backend = Some(backend);
        watched?;

        state.files.insert(path.clone(), callback);
        self.start_locked(&mut state, &runtime);
        info!("Watching configuration file: {}", path.display());
        Ok(())
    }

    fn watch(&self, callback: ChangeCallback) {
        let mut state = self.state.lock();
        for slot in state.files.values_mut() {
            *slot = callback.clone();
        }

        match Handle::try_current() {
            Ok(runtime) => self.start_locked(&mut state, &runtime),
            Err(_) => warn!("File watcher needs a tokio runtime; dispatch not started"),
        }
    }

    async fn close(&self) -> Result<()> {
        let dispatch = self.state.lock().dispatch.take();

        if let Some(dispatch) = dispatch {
            // the loop may already be gone if the backend failed
            let _ = dispatch.shutdown.send(());
            if let Err(e) = dispatch.handle.await {
                warn!("File watcher dispatch task ended abnormally: {}", e);
            }
        }

        let backend = {
            let mut state = self.state.lock();
            state.files.clear();
            state.backend.take()
        };
        if backend.is_some() {
            info!("File watcher closed");
        }
        drop(backend);
        Ok(())
    }
}
