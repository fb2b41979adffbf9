//! Config file formats

use crate::contract::{EXT_JSON, EXT_YAML, EXT_YML};
use crate::error::ConfigError;
use crate::value::{Settings, Value};
use crate::Result;
use std::path::Path;

/// A supported config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// Detect the format from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            EXT_YAML | EXT_YML => Some(Format::Yaml),
            EXT_JSON => Some(Format::Json),
            _ => None,
        }
    }
}

/// True if the file has a supported config extension
pub fn is_supported(path: &Path) -> bool {
    Format::from_path(path).is_some()
}

/// Parse `content` as a settings map. `path` is only used for error context.
pub fn parse(content: &str, format: Format, path: &Path) -> Result<Settings> {
    let root = match format {
        Format::Yaml => {
            let doc: serde_yaml::Value =
                serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })?;
            Value::from(doc)
        }
        Format::Json => {
            let doc: serde_json::Value =
                serde_json::from_str(content).map_err(|source| ConfigError::Json {
                    path: path.to_path_buf(),
                    source,
                })?;
            Value::from(doc)
        }
    };

    match root {
        Value::Map(settings) => Ok(settings),
        Value::AnyMap(map) => Ok(map.into_iter().map(|(k, v)| (k.to_string(), v)).collect()),
        // empty document
        Value::Null => Ok(Settings::new()),
        _ => Err(ConfigError::InvalidRoot {
            path: path.to_path_buf(),
        }),
    }
}

/// Read and parse a config file, choosing the format from its extension
pub fn read_settings(path: &Path) -> Result<Settings> {
    let format = Format::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse(&content, format, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_path(Path::new("a.yaml")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("a.YML")), Some(Format::Yaml));
        assert_eq!(Format::from_path(Path::new("dir/a.json")), Some(Format::Json));
        assert_eq!(Format::from_path(Path::new("a.toml")), None);
        assert!(!is_supported(Path::new("README")));
    }

    #[test]
    fn test_empty_yaml_is_empty_map() {
        let settings = parse("", Format::Yaml, Path::new("empty.yaml")).unwrap();
        assert!(settings.is_empty());
    }

    #[test]
    fn test_non_mapping_root_is_rejected() {
        let err = parse("[1, 2]", Format::Json, Path::new("list.json")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRoot { .. }));
    }

    #[test]
    fn test_read_settings_errors() {
        let temp_dir = TempDir::new().unwrap();

        let toml = temp_dir.path().join("app.toml");
        fs::write(&toml, "a = 1").unwrap();
        assert!(matches!(
            read_settings(&toml).unwrap_err(),
            ConfigError::UnsupportedFormat { .. }
        ));

        let missing = temp_dir.path().join("missing.yaml");
        assert!(matches!(
            read_settings(&missing).unwrap_err(),
            ConfigError::Io { .. }
        ));

        let broken = temp_dir.path().join("broken.json");
        fs::write(&broken, "{not json").unwrap();
        assert!(matches!(
            read_settings(&broken).unwrap_err(),
            ConfigError::Json { .. }
        ));
    }
}
