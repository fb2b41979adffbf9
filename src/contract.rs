//! Collaborator Contracts
//!
//! The narrow interfaces the configuration service is composed from. Default
//! implementations live in [`crate::provider`], [`crate::loader`] and
//! [`crate::watcher`]; any of them can be swapped through
//! [`crate::config::ConfigBuilder`].

use crate::value::{KeyType, Settings, Value};
use crate::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Supported config file extensions
pub const EXT_YAML: &str = "yaml";
pub const EXT_YML: &str = "yml";
pub const EXT_JSON: &str = "json";

/// Callback invoked when a watched file changes
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Typed, read-only access to configuration values
pub trait ValueAccessor {
    fn get(&self, key: &str, kind: KeyType) -> Result<Value>;
    fn has(&self, key: &str) -> bool;
}

/// Backend that ingests and stores raw configuration data
pub trait Provider: Send + Sync {
    /// Load (or reload) the configured file, if any
    fn read_in_config(&self) -> Result<()>;

    /// The complete settings tree as currently known
    fn all_settings(&self) -> Settings;

    /// Lookup of a single key, dot paths allowed
    fn get_key(&self, key: &str) -> Option<Value>;

    /// Override a key programmatically
    fn set(&self, key: &str, value: Value);

    fn is_set(&self, key: &str) -> bool;

    fn set_config_file(&self, path: &Path);

    fn config_file(&self) -> Option<PathBuf>;

    /// Deep-merge another settings map on top of the loaded data
    fn merge_config_map(&self, settings: Settings) -> Result<()>;

    /// Drop everything merged so far; the file layer and overrides stay
    fn reset_merged(&self);
}

/// Populates a provider from config files
pub trait FileLoader: Send + Sync {
    fn load_from_file(&self, path: &Path) -> Result<()>;

    /// Load every supported file in `dir`: the first (by name) as the base,
    /// the rest merged on top
    fn load_from_directory(&self, dir: &Path) -> Result<()>;

    fn provider(&self) -> Option<Arc<dyn Provider>>;
}

/// Populates a provider from the process environment
pub trait EnvLoader: Send + Sync {
    fn load_from_env(&self, prefix: &str) -> Result<()>;

    fn provider(&self) -> Option<Arc<dyn Provider>>;
}

/// Watches files and invokes callbacks when they change
#[async_trait]
pub trait Watcher: Send + Sync {
    /// Watch `path` and call `callback` whenever it is written
    fn add_file(&self, path: &Path, callback: ChangeCallback) -> Result<()>;

    /// Replace the callback of every registered file with `callback`.
    ///
    /// Files added afterwards keep their own callback. This is how a single
    /// handler is installed for everything being watched.
    fn watch(&self, callback: ChangeCallback);

    /// Stop dispatching. No callback runs after this returns.
    async fn close(&self) -> Result<()>;
}
