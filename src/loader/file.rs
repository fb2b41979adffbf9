//! Config file loader

use crate::contract::{FileLoader, Provider};
use crate::error::ConfigError;
use crate::provider::format;
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Loads YAML and JSON files into a [`Provider`]
#[derive(Default, Clone)]
pub struct ConfigFileLoader {
    provider: Option<Arc<dyn Provider>>,
}

impl ConfigFileLoader {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    fn require_provider(&self) -> Result<&Arc<dyn Provider>> {
        self.provider.as_ref().ok_or(ConfigError::NoConfigSource)
    }

    /// Supported config files directly inside `dir`, sorted by file name
    pub fn config_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::ReadDirectory {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ConfigError::ReadDirectory {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && format::is_supported(&path) {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    fn merge_file(provider: &Arc<dyn Provider>, path: &Path) -> Result<()> {
        let settings = format::read_settings(path)?;
        provider.merge_config_map(settings)
    }
}

impl FileLoader for ConfigFileLoader {
    fn load_from_file(&self, path: &Path) -> Result<()> {
        let provider = self.require_provider()?;

        info!("Loading configuration from: {}", path.display());
        provider.set_config_file(path);
        provider
            .read_in_config()
            .map_err(|e| ConfigError::ReadConfigFile {
                path: path.to_path_buf(),
                source: Box::new(e),
            })?;
        provider.reset_merged();
        Ok(())
    }

    fn load_from_directory(&self, dir: &Path) -> Result<()> {
        let provider = self.require_provider()?;

        let files = Self::config_files(dir)?;
        let Some((base, rest)) = files.split_first() else {
            debug!("No config files found in {}", dir.display());
            provider.reset_merged();
            return Ok(());
        };

        provider.set_config_file(base);
        provider
            .read_in_config()
            .map_err(|e| ConfigError::LoadFile {
                path: base.clone(),
                source: Box::new(e),
            })?;
        debug!("Loaded base config file {}", base.display());

        // a fresh base replaces whatever earlier directory loads merged
        provider.reset_merged();

        for path in rest {
            Self::merge_file(provider, path).map_err(|e| ConfigError::MergeFile {
                path: path.clone(),
                source: Box::new(e),
            })?;
            debug!("Merged config file {}", path.display());
        }

        info!("Loaded {} config files from {}", files.len(), dir.display());
        Ok(())
    }

    fn provider(&self) -> Option<Arc<dyn Provider>> {
        self.provider.clone()
    }
}
