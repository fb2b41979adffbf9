//! Environment variable loader
//!
//! `APP_SERVER_PORT=8080` loaded with prefix `app` becomes `server.port`.

use crate::contract::{EnvLoader, Provider};
use crate::error::ConfigError;
use crate::value::Value;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Upper-cases the prefix and appends the `_` separator; empty stays empty
pub fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() {
        return String::new();
    }
    format!("{}_", prefix.to_uppercase())
}

/// `APP_NAME` -> `app.name`
pub fn normalize_env_key(key: &str) -> String {
    key.replace('_', ".").to_lowercase()
}

pub fn strip_prefix<'a>(key: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return key;
    }
    key.strip_prefix(prefix).unwrap_or(key)
}

/// Split `KEY=VALUE`; a missing `=` yields an empty value
pub fn split_env(entry: &str) -> (&str, &str) {
    entry.split_once('=').unwrap_or((entry, ""))
}

/// Loads process environment variables into a [`Provider`]
#[derive(Default, Clone)]
pub struct EnvVarLoader {
    provider: Option<Arc<dyn Provider>>,
}

impl EnvVarLoader {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Apply `vars` as if they were the process environment
    pub fn load_vars<I, K, V>(&self, prefix: &str, vars: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let provider = self.provider.as_ref().ok_or(ConfigError::ProviderNotSet)?;
        let prefix = normalize_prefix(prefix);

        let mut loaded = 0;
        for (name, value) in vars {
            let name = name.as_ref();
            if !prefix.is_empty() && !name.starts_with(&prefix) {
                continue;
            }

            let key = normalize_env_key(strip_prefix(name, &prefix));
            debug!("Env {} -> {}", name, key);
            provider.set(&key, Value::String(value.into()));
            loaded += 1;
        }
        Ok(loaded)
    }
}

impl EnvLoader for EnvVarLoader {
    fn load_from_env(&self, prefix: &str) -> Result<()> {
        // vars() panics on non-unicode entries; skip those instead
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));

        let loaded = self.load_vars(prefix, vars)?;
        info!("Loaded {} environment variables (prefix: {:?})", loaded, prefix);
        Ok(())
    }

    fn provider(&self) -> Option<Arc<dyn Provider>> {
        self.provider.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::LayeredProvider;

    #[test]
    fn test_helpers() {
        assert_eq!(normalize_prefix("app"), "APP_");
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_env_key("SERVER_READ_TIMEOUT"), "server.read.timeout");
        assert_eq!(strip_prefix("APP_NAME", "APP_"), "NAME");
        assert_eq!(strip_prefix("OTHER_NAME", "APP_"), "OTHER_NAME");
        assert_eq!(split_env("A=b=c"), ("A", "b=c"));
        assert_eq!(split_env("FLAG"), ("FLAG", ""));
    }

    #[test]
    fn test_without_provider() {
        let loader = EnvVarLoader::default();
        assert!(matches!(
            loader.load_from_env("APP").unwrap_err(),
            ConfigError::ProviderNotSet
        ));
    }

    #[test]
    fn test_prefix_filter_and_normalization() {
        let provider: Arc<dyn Provider> = Arc::new(LayeredProvider::new());
        let loader = EnvVarLoader::new(provider.clone());

        let loaded = loader
            .load_vars(
                "app",
                [
                    ("APP_SERVER_PORT", "8080"),
                    ("APP_AUTH_ENABLED", "true"),
                    ("HOME", "/root"),
                ],
            )
            .unwrap();

        assert_eq!(loaded, 2);
        assert_eq!(provider.get_key("server.port"), Some(Value::from("8080")));
        assert_eq!(provider.get_key("auth.enabled"), Some(Value::from("true")));
        assert!(!provider.is_set("home"));
    }

    #[test]
    fn test_process_environment() {
        std::env::set_var("SCGENVTEST_APP_NAME", "SuperApp");

        let provider: Arc<dyn Provider> = Arc::new(LayeredProvider::new());
        let loader = EnvVarLoader::new(provider.clone());
        loader.load_from_env("scgenvtest").unwrap();
        std::env::remove_var("SCGENVTEST_APP_NAME");

        assert_eq!(provider.get_key("app.name"), Some(Value::from("SuperApp")));
    }
}
