//! Decode the configuration into application structs

use super::service::Config;
use crate::error::{ConfigError, FieldViolation};
use crate::value::de;
use crate::Result;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Field-level checks run after decoding.
///
/// Return every violation found, not just the first; an empty list means the
/// value is valid.
pub trait Validate {
    fn validate(&self) -> Vec<FieldViolation>;
}

impl Config {
    /// Decode the provider's full settings into `T`.
    ///
    /// Keys are lower-case by the time they reach the provider, so field names
    /// (or their `#[serde(rename)]`) must be too. Durations are humantime
    /// strings and times RFC 3339 strings.
    ///
    /// Decoding is weakly typed, since environment values are always text:
    /// numeric fields accept numeric strings (`"8080"`), bool fields accept
    /// the spellings of [`parse_bool`](crate::value::coerce::parse_bool), and
    /// string fields accept numbers and bools.
    pub fn load<T: DeserializeOwned>(&self) -> Result<T> {
        let settings = self.provider().all_settings();
        debug!("Decoding {} top-level keys", settings.len());
        de::from_settings(settings).map_err(ConfigError::Decode)
    }

    /// [`Config::load`] followed by [`Validate::validate`]
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let value: T = self.load()?;
        let violations = value.validate();
        if !violations.is_empty() {
            return Err(ConfigError::Validation(violations));
        }
        Ok(value)
    }
}
