//! Configuration Service
//!
//! Owns the provider, loaders and watcher, and the current [`Getter`]
//! snapshot. Reads go through the snapshot; `reload` swaps in a new one.

use super::getter::Getter;
use crate::contract::{ChangeCallback, EnvLoader, FileLoader, Provider, ValueAccessor, Watcher};
use crate::dotmap;
use crate::error::ConfigError;
use crate::loader::{ConfigFileLoader, EnvVarLoader};
use crate::provider::LayeredProvider;
use crate::value::{KeyType, Value};
use crate::watcher::FileWatcher;
use crate::Result;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

/// Published after every successful reload
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    /// Leaf paths present in the new snapshot
    pub keys: Vec<String>,
    pub timestamp: SystemTime,
}

/// Assembles a [`Config`]; components left unset get the defaults
#[derive(Default)]
pub struct ConfigBuilder {
    provider: Option<Arc<dyn Provider>>,
    watcher: Option<Arc<dyn Watcher>>,
    file_loader: Option<Arc<dyn FileLoader>>,
    env_loader: Option<Arc<dyn EnvLoader>>,
    automatic_env: Option<String>,
}

impl ConfigBuilder {
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_watcher(mut self, watcher: Arc<dyn Watcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn with_file_loader(mut self, loader: Arc<dyn FileLoader>) -> Self {
        self.file_loader = Some(loader);
        self
    }

    pub fn with_env_loader(mut self, loader: Arc<dyn EnvLoader>) -> Self {
        self.env_loader = Some(loader);
        self
    }

    /// Let environment variables override file and merged values in the
    /// default provider. `prefix` may be empty.
    ///
    /// Has no effect together with [`with_provider`](Self::with_provider).
    pub fn with_automatic_env(mut self, prefix: &str) -> Self {
        self.automatic_env = Some(prefix.to_string());
        self
    }

    /// Default loaders are bound to the configured provider
    pub fn build(self) -> Config {
        let automatic_env = self.automatic_env;
        let provider = match self.provider {
            Some(provider) => {
                if automatic_env.is_some() {
                    warn!("Automatic env overlay ignored for a custom provider");
                }
                provider
            }
            None => {
                let layered = LayeredProvider::new();
                match automatic_env.as_deref() {
                    Some(prefix) => Arc::new(layered.with_automatic_env(Some(prefix))),
                    None => Arc::new(layered),
                }
            }
        };
        let file_loader = self
            .file_loader
            .unwrap_or_else(|| Arc::new(ConfigFileLoader::new(provider.clone())));
        let env_loader = self
            .env_loader
            .unwrap_or_else(|| Arc::new(EnvVarLoader::new(provider.clone())));
        let watcher = self.watcher.unwrap_or_else(|| Arc::new(FileWatcher::new()));

        let getter = Arc::new(Getter::new(provider.all_settings()));
        let (change_sender, _) = broadcast::channel(100);
        let (shutdown, _) = watch::channel(false);

        Config {
            provider,
            file_loader,
            env_loader,
            watcher,
            getter: RwLock::new(getter),
            reload_lock: Mutex::new(()),
            watched_files: RwLock::new(HashSet::new()),
            change_sender,
            shutdown,
        }
    }
}

/// The configuration service
pub struct Config {
    provider: Arc<dyn Provider>,
    file_loader: Arc<dyn FileLoader>,
    env_loader: Arc<dyn EnvLoader>,
    watcher: Arc<dyn Watcher>,
    getter: RwLock<Arc<Getter>>,
    reload_lock: Mutex<()>,
    watched_files: RwLock<HashSet<PathBuf>>,
    change_sender: broadcast::Sender<ReloadEvent>,
    shutdown: watch::Sender<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn get(&self, key: &str, kind: KeyType) -> Result<Value> {
        self.getter().get(key, kind)
    }

    pub fn has(&self, key: &str) -> bool {
        self.getter().has_key(key)
    }

    /// The current snapshot. Hold on to it to read several keys from the
    /// same generation.
    pub fn getter(&self) -> Arc<Getter> {
        self.getter.read().clone()
    }

    /// Ask the provider to read its sources. The snapshot is left untouched.
    pub fn read_in_config(&self) -> Result<()> {
        self.provider
            .read_in_config()
            .map_err(|e| ConfigError::ReadConfig(Box::new(e)))
    }

    /// Re-read the provider and replace the snapshot.
    ///
    /// On failure the previous snapshot stays in effect. Concurrent reloads
    /// run one at a time, so the last one to finish installs the newest data.
    pub fn reload(&self) -> Result<()> {
        let _guard = self.reload_lock.lock();
        self.provider
            .read_in_config()
            .map_err(|e| ConfigError::Reload(Box::new(e)))?;

        let getter = Arc::new(Getter::new(self.provider.all_settings()));
        let keys = getter
            .settings()
            .map(dotmap::leaf_paths)
            .unwrap_or_default();
        *self.getter.write() = getter;

        info!("Configuration reloaded ({} keys)", keys.len());

        let event = ReloadEvent {
            keys,
            timestamp: SystemTime::now(),
        };
        if self.change_sender.send(event).is_err() {
            debug!("No subscribers for reload event");
        }
        Ok(())
    }

    /// Track `path` in the service's own file set
    pub fn watch_file(&self, path: impl Into<PathBuf>) {
        self.watched_files.write().insert(path.into());
    }

    pub fn unwatch_file(&self, path: &Path) {
        self.watched_files.write().remove(path);
    }

    /// Tracked files, sorted
    pub fn watched_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.watched_files.read().iter().cloned().collect();
        files.sort();
        files
    }

    /// Register `path` with the watcher. On change the provider re-reads its
    /// sources; refreshing the snapshot is left to the caller.
    pub fn start_watching(&self, path: &Path) -> Result<()> {
        let provider = self.provider.clone();
        let callback: ChangeCallback = Arc::new(move || {
            if let Err(e) = provider.read_in_config() {
                warn!("Failed to re-read configuration after change: {}", e);
            }
        });
        self.watcher.add_file(path, callback)
    }

    /// Signal shutdown and release the watcher
    pub async fn close(&self) -> Result<()> {
        self.shutdown.send_replace(true);
        self.watcher.close().await?;
        info!("Configuration service closed");
        Ok(())
    }

    /// Reload notifications
    pub fn subscribe(&self) -> BroadcastStream<ReloadEvent> {
        BroadcastStream::new(self.change_sender.subscribe())
    }

    /// Flips to `true` once `close` is called
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn provider(&self) -> Arc<dyn Provider> {
        self.provider.clone()
    }

    pub fn file_loader(&self) -> Arc<dyn FileLoader> {
        self.file_loader.clone()
    }

    pub fn env_loader(&self) -> Arc<dyn EnvLoader> {
        self.env_loader.clone()
    }

    pub fn watcher(&self) -> Arc<dyn Watcher> {
        self.watcher.clone()
    }
}

impl ValueAccessor for Config {
    fn get(&self, key: &str, kind: KeyType) -> Result<Value> {
        Config::get(self, key, kind)
    }

    fn has(&self, key: &str) -> bool {
        Config::has(self, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::value::Settings;
    use std::fs;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use tempfile::TempDir;
    use tokio_stream::StreamExt;

    #[derive(Default)]
    struct RecordingWatcher {
        added: Mutex<Vec<PathBuf>>,
        callbacks: Mutex<Vec<ChangeCallback>>,
        closed: AtomicUsize,
    }

    impl RecordingWatcher {
        fn fire(&self) {
            for callback in self.callbacks.lock().iter() {
                callback();
            }
        }
    }

    #[async_trait]
    impl Watcher for RecordingWatcher {
        fn add_file(&self, path: &Path, callback: ChangeCallback) -> Result<()> {
            self.added.lock().push(path.to_path_buf());
            self.callbacks.lock().push(callback);
            Ok(())
        }

        fn watch(&self, callback: ChangeCallback) {
            for slot in self.callbacks.lock().iter_mut() {
                *slot = callback.clone();
            }
        }

        async fn close(&self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn provider_with(entries: &[(&str, Value)]) -> Arc<dyn Provider> {
        let provider = Arc::new(LayeredProvider::new());
        for (key, value) in entries {
            provider.set(key, value.clone());
        }
        provider
    }

    #[test]
    fn test_get_and_has() {
        let provider = provider_with(&[
            ("str.int", Value::from("420")),
            ("my.int", Value::Int(123)),
            ("my.str", Value::from("abc")),
            ("my.bool", Value::Bool(true)),
        ]);
        let config = Config::builder().with_provider(provider).build();

        assert_eq!(config.get("str.int", KeyType::Int).unwrap(), Value::Int(420));
        assert_eq!(config.get("my.int", KeyType::Int).unwrap(), Value::Int(123));
        assert_eq!(config.get("my.str", KeyType::String).unwrap(), Value::from("abc"));
        assert_eq!(config.get("my.bool", KeyType::Bool).unwrap(), Value::Bool(true));
        assert!(config.get("missing", KeyType::Int).unwrap_err().is_not_found());
        assert!(config.get("my.str", KeyType::Int).is_err());

        assert!(config.has("my"));
        assert!(config.has("my.int"));
        assert!(!config.has("nope"));
    }

    #[test]
    fn test_snapshot_is_captured_until_reload() {
        let provider = provider_with(&[("name", Value::from("first"))]);
        let config = Config::builder().with_provider(provider.clone()).build();
        let pinned = config.getter();

        provider.set("name", Value::from("second"));
        assert_eq!(config.getter().get_string("name"), "first");

        config.reload().unwrap();
        assert_eq!(config.getter().get_string("name"), "second");
        assert_eq!(pinned.get_string("name"), "first");
    }

    #[test]
    fn test_failed_reload_keeps_old_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.yaml");
        fs::write(&path, "name: good\n").unwrap();

        let config = Config::new();
        config.file_loader().load_from_file(&path).unwrap();
        config.reload().unwrap();
        assert_eq!(config.getter().get_string("name"), "good");

        fs::write(&path, "name: [broken\n").unwrap();
        let err = config.reload().unwrap_err();
        assert!(matches!(err, ConfigError::Reload(_)));
        assert_eq!(config.getter().get_string("name"), "good");

        fs::remove_file(&path).unwrap();
        assert!(matches!(
            config.read_in_config().unwrap_err(),
            ConfigError::ReadConfig(_)
        ));
    }

    #[test]
    fn test_watched_files_set() {
        let config = Config::new();
        config.watch_file("/etc/b.yaml");
        config.watch_file("/etc/a.yaml");
        config.watch_file("/etc/a.yaml");
        assert_eq!(
            config.watched_files(),
            vec![PathBuf::from("/etc/a.yaml"), PathBuf::from("/etc/b.yaml")]
        );

        config.unwatch_file(Path::new("/etc/a.yaml"));
        config.unwatch_file(Path::new("/etc/missing.yaml"));
        assert_eq!(config.watched_files(), vec![PathBuf::from("/etc/b.yaml")]);
    }

    #[test]
    fn test_default_loaders_share_provider() {
        let provider: Arc<dyn Provider> = Arc::new(LayeredProvider::new());
        let config = Config::builder().with_provider(provider.clone()).build();

        let file_provider = config.file_loader().provider().unwrap();
        let env_provider = config.env_loader().provider().unwrap();
        assert!(Arc::ptr_eq(&file_provider, &provider));
        assert!(Arc::ptr_eq(&env_provider, &provider));
        assert!(Arc::ptr_eq(&config.provider(), &provider));
    }

    #[tokio::test]
    async fn test_start_watching_rereads_provider_only() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.yaml");
        fs::write(&path, "name: before\n").unwrap();

        let watcher = Arc::new(RecordingWatcher::default());
        let config = Config::builder().with_watcher(watcher.clone()).build();
        config.file_loader().load_from_file(&path).unwrap();
        config.reload().unwrap();
        config.start_watching(&path).unwrap();
        assert_eq!(*watcher.added.lock(), vec![path.clone()]);

        fs::write(&path, "name: after\n").unwrap();
        watcher.fire();

        assert_eq!(config.provider().get_key("name"), Some(Value::from("after")));
        assert_eq!(config.getter().get_string("name"), "before");

        config.close().await.unwrap();
        assert_eq!(watcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subscribe_and_shutdown_signal() {
        let provider = provider_with(&[("a.b", Value::Int(1)), ("c", Value::Bool(false))]);
        let config = Config::builder().with_provider(provider).build();
        let mut events = config.subscribe();
        let shutdown = config.shutdown_signal();

        config.reload().unwrap();
        let event = events.next().await.unwrap().unwrap();
        assert_eq!(event.keys, vec!["a.b".to_string(), "c".to_string()]);

        assert!(!*shutdown.borrow());
        config.close().await.unwrap();
        assert!(*shutdown.borrow());
    }

    #[test]
    fn test_close_without_watching() {
        let config = Config::new();
        tokio_test::block_on(config.close()).unwrap();
        assert!(*config.shutdown_signal().borrow());
        tokio_test::block_on(config.close()).unwrap();
    }

    #[test]
    fn test_value_accessor_object() {
        let provider = provider_with(&[("port", Value::Int(8080))]);
        let config = Config::builder().with_provider(provider).build();

        let accessors: Vec<Box<dyn ValueAccessor>> =
            vec![Box::new(config.getter().as_ref().clone()), Box::new(config)];
        for accessor in &accessors {
            assert_eq!(accessor.get("port", KeyType::Uint).unwrap(), Value::Uint(8080));
            assert!(accessor.has("port"));
        }
    }

    fn generation(i: i64) -> Value {
        Value::Map(Settings::from([
            ("a".to_string(), Value::Int64(i)),
            ("b".to_string(), Value::Int64(i)),
        ]))
    }

    #[test]
    fn test_concurrent_readers_see_whole_generations() {
        let provider = provider_with(&[("gen", generation(0))]);
        let config = Config::builder().with_provider(provider.clone()).build();
        let done = AtomicBool::new(false);
        let last = 300;

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    while !done.load(Ordering::SeqCst) {
                        let getter = config.getter();
                        assert_eq!(getter.get_int64("gen.a"), getter.get_int64("gen.b"));
                    }
                });
            }

            // extra reloaders racing the writer's own reloads
            for _ in 0..2 {
                scope.spawn(|| {
                    while !done.load(Ordering::SeqCst) {
                        config.reload().unwrap();
                    }
                });
            }

            scope.spawn(|| {
                for i in 1..=last {
                    provider.set("gen", generation(i));
                    config.reload().unwrap();
                }
                done.store(true, Ordering::SeqCst);
            });
        });

        let getter = config.getter();
        assert_eq!(getter.get_int64("gen.a"), last);
        assert_eq!(getter.get_int64("gen.b"), last);
    }

    #[test]
    fn test_builder_automatic_env_overlay() {
        let config = Config::builder().with_automatic_env("scgbuilderenv").build();
        config
            .provider()
            .merge_config_map(Settings::from([(
                "server".to_string(),
                Value::Map(Settings::from([
                    ("port".to_string(), Value::Int(80)),
                    ("host".to_string(), Value::from("localhost")),
                ])),
            )]))
            .unwrap();

        std::env::set_var("SCGBUILDERENV_SERVER_PORT", "9000");
        config.reload().unwrap();
        std::env::remove_var("SCGBUILDERENV_SERVER_PORT");

        let getter = config.getter();
        assert_eq!(getter.get_int("server.port"), 9000);
        assert_eq!(getter.get_string("server.host"), "localhost");
    }
}
