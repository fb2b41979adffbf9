//! Layered in-memory provider
//!
//! Keeps one layer per source and combines them on demand. From lowest to
//! highest precedence: config file, merged maps, automatic environment
//! overlay (opt-in), explicit overrides. Keys are stored lower-cased.

use super::format;
use crate::contract::Provider;
use crate::dotmap;
use crate::value::{Settings, Value};
use crate::Result;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Layers {
    config_file: Option<PathBuf>,
    file: Settings,
    merged: Settings,
    overrides: Settings,
}

/// Default [`Provider`] implementation
#[derive(Debug, Default)]
pub struct LayeredProvider {
    layers: RwLock<Layers>,
    automatic_env: Option<String>,
}

impl LayeredProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let environment variables override known keys.
    ///
    /// A key `server.read-timeout` is looked up as `SERVER_READ_TIMEOUT`, or
    /// `APP_SERVER_READ_TIMEOUT` with prefix `app`. Only keys already present
    /// in some layer are considered.
    pub fn with_automatic_env(mut self, prefix: Option<&str>) -> Self {
        let prefix = prefix
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}_", p.to_uppercase()))
            .unwrap_or_default();
        self.automatic_env = Some(prefix);
        self
    }

    fn env_name(prefix: &str, key: &str) -> String {
        format!("{}{}", prefix, key.replace(['.', '-'], "_").to_uppercase())
    }

    fn apply_env(&self, settings: &mut Settings) {
        let Some(prefix) = &self.automatic_env else {
            return;
        };

        for path in dotmap::leaf_paths(settings) {
            if let Ok(value) = std::env::var(Self::env_name(prefix, &path)) {
                dotmap::set_path(settings, &path, Value::String(value));
            }
        }
    }
}

impl Provider for LayeredProvider {
    fn read_in_config(&self) -> Result<()> {
        let Some(path) = self.config_file() else {
            debug!("No config file set, skipping file read");
            return Ok(());
        };

        let settings = dotmap::lowercase_keys(format::read_settings(&path)?);
        info!("Loaded {} top-level keys from {}", settings.len(), path.display());

        self.layers.write().file = settings;
        Ok(())
    }

    fn all_settings(&self) -> Settings {
        let mut combined = {
            let layers = self.layers.read();
            let mut combined = layers.file.clone();
            dotmap::deep_merge(&mut combined, layers.merged.clone());
            combined
        };

        self.apply_env(&mut combined);

        dotmap::deep_merge(&mut combined, self.layers.read().overrides.clone());
        combined
    }

    fn get_key(&self, key: &str) -> Option<Value> {
        let settings = self.all_settings();
        dotmap::resolve(&settings, &key.to_lowercase()).map(|v| v.into_owned())
    }

    fn set(&self, key: &str, value: Value) {
        let value = match value {
            Value::Map(map) => Value::Map(dotmap::lowercase_keys(map)),
            other => other,
        };
        dotmap::set_path(&mut self.layers.write().overrides, &key.to_lowercase(), value);
    }

    fn is_set(&self, key: &str) -> bool {
        self.get_key(key).is_some()
    }

    fn set_config_file(&self, path: &Path) {
        self.layers.write().config_file = Some(path.to_path_buf());
    }

    fn config_file(&self) -> Option<PathBuf> {
        self.layers.read().config_file.clone()
    }

    fn merge_config_map(&self, settings: Settings) -> Result<()> {
        let settings = dotmap::lowercase_keys(settings);
        dotmap::deep_merge(&mut self.layers.write().merged, settings);
        Ok(())
    }

    fn reset_merged(&self) {
        let mut layers = self.layers.write();
        if !layers.merged.is_empty() {
            debug!("Clearing {} merged top-level keys", layers.merged.len());
        }
        layers.merged.clear();
    }
}
