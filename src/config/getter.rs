//! Typed access over an immutable settings snapshot

use crate::contract::ValueAccessor;
use crate::dotmap;
use crate::error::ConfigError;
use crate::value::{coerce, KeyType, Settings, Value};
use crate::Result;
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Typed accessors over a snapshot captured from a provider.
///
/// The snapshot is never mutated; a reload builds a new `Getter`. Cloning is
/// cheap and shares the snapshot.
#[derive(Debug, Clone, Default)]
pub struct Getter {
    settings: Option<Arc<Settings>>,
}

impl Getter {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Some(Arc::new(settings)),
        }
    }

    /// A getter with no snapshot; every lookup reports not found
    pub fn empty() -> Self {
        Self { settings: None }
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_deref()
    }

    fn lookup(&self, key: &str) -> Option<(Cow<'_, Value>, bool)> {
        let settings = self.settings.as_deref()?;
        if key.is_empty() {
            return None;
        }
        if let Some(value) = settings.get(key) {
            return Some((Cow::Borrowed(value), true));
        }
        dotmap::resolve(settings, key).map(|value| (value, false))
    }

    /// Look up `key` and convert it to `kind`.
    ///
    /// A flat key (`"a.b"` stored as one key) is tried before path resolution.
    /// Conversion failures on a flat hit surface as [`ConfigError::Coercion`];
    /// on a path hit they surface as [`ConfigError::WrongType`].
    pub fn get(&self, key: &str, kind: KeyType) -> Result<Value> {
        let (value, flat) = self.lookup(key).ok_or_else(|| ConfigError::KeyNotFound {
            key: key.to_string(),
        })?;

        match coerce(&value, kind) {
            Ok(converted) => Ok(converted),
            Err(err) if flat => Err(err),
            Err(ConfigError::Coercion(source)) => Err(ConfigError::WrongType {
                key: key.to_string(),
                source,
            }),
            Err(err) => Err(err),
        }
    }

    /// Like [`Getter::get`] with the type given by name (`"int"`, `"[]string"`, ...)
    pub fn get_by_name(&self, key: &str, type_name: &str) -> Result<Value> {
        self.get(key, type_name.parse()?)
    }

    /// The raw value stored at `key`, without conversion
    pub fn get_key(&self, key: &str) -> Option<Value> {
        self.lookup(key).map(|(value, _)| value.into_owned())
    }

    /// True if `key` exists, whatever its type
    pub fn has_key(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    fn typed<T>(&self, key: &str, kind: KeyType, extract: fn(Value) -> Option<T>) -> Option<T> {
        self.get(key, kind).ok().and_then(extract)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.typed(key, KeyType::String, |v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn get_int(&self, key: &str) -> isize {
        self.typed(key, KeyType::Int, |v| match v {
            Value::Int(i) => Some(i),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn get_int32(&self, key: &str) -> i32 {
        self.typed(key, KeyType::Int32, |v| match v {
            Value::Int32(i) => Some(i),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn get_int64(&self, key: &str) -> i64 {
        self.typed(key, KeyType::Int64, |v| match v {
            Value::Int64(i) => Some(i),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn get_uint(&self, key: &str) -> usize {
        self.typed(key, KeyType::Uint, |v| match v {
            Value::Uint(u) => Some(u),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn get_uint32(&self, key: &str) -> u32 {
        self.typed(key, KeyType::Uint32, |v| match v {
            Value::Uint32(u) => Some(u),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn get_uint64(&self, key: &str) -> u64 {
        self.typed(key, KeyType::Uint64, |v| match v {
            Value::Uint64(u) => Some(u),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn get_float32(&self, key: &str) -> f32 {
        self.typed(key, KeyType::Float32, |v| match v {
            Value::Float32(f) => Some(f),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn get_float64(&self, key: &str) -> f64 {
        self.typed(key, KeyType::Float64, |v| match v {
            Value::Float64(f) => Some(f),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.typed(key, KeyType::Bool, |v| match v {
            Value::Bool(b) => Some(b),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn get_duration(&self, key: &str) -> Duration {
        self.typed(key, KeyType::Duration, |v| match v {
            Value::Duration(d) => Some(d),
            _ => None,
        })
        .unwrap_or_default()
    }

    /// Zero value is the Unix epoch
    pub fn get_time(&self, key: &str) -> DateTime<Utc> {
        self.typed(key, KeyType::Time, |v| match v {
            Value::Time(t) => Some(t),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn get_string_slice(&self, key: &str) -> Vec<String> {
        self.typed(key, KeyType::StringSlice, |v| match v {
            Value::StringList(items) => Some(items),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn get_string_map(&self, key: &str) -> Settings {
        self.typed(key, KeyType::Map, |v| match v {
            Value::Map(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default()
    }

    pub fn get_bytes(&self, key: &str) -> Vec<u8> {
        self.typed(key, KeyType::Bytes, |v| match v {
            Value::Bytes(b) => Some(b),
            _ => None,
        })
        .unwrap_or_default()
    }

    /// Zero value is the nil UUID
    pub fn get_uuid(&self, key: &str) -> Uuid {
        self.typed(key, KeyType::Uuid, |v| match v {
            Value::Uuid(u) => Some(u),
            _ => None,
        })
        .unwrap_or_default()
    }

    /// URLs have no zero value, so absence is `None`. Only absolute URLs
    /// parse; a relative reference like `/api/v1` also yields `None`.
    pub fn get_url(&self, key: &str) -> Option<Url> {
        self.typed(key, KeyType::Url, |v| match v {
            Value::Url(u) => Some(u),
            _ => None,
        })
    }
}

impl ValueAccessor for Getter {
    fn get(&self, key: &str, kind: KeyType) -> Result<Value> {
        Getter::get(self, key, kind)
    }

    fn has(&self, key: &str) -> bool {
        self.has_key(key)
    }
}
