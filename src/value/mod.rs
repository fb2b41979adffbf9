//! Configuration Values
//!
//! The untyped value model held by a settings snapshot, plus the type tags and
//! conversion table used to turn those values into concrete types.

pub mod coerce;
pub mod de;
pub mod key_type;

pub use coerce::coerce;
pub use key_type::KeyType;

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// A settings snapshot: string keys to heterogeneous values
pub type Settings = BTreeMap<String, Value>;

/// A comparable, non-float mapping key for maps that are not string keyed
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    String(String),
}

impl MapKey {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MapKey::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{}", b),
            MapKey::Int(i) => write!(f, "{}", i),
            MapKey::Uint(u) => write!(f, "{}", u),
            MapKey::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> Self {
        MapKey::String(s.to_string())
    }
}

/// An untyped configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(isize),
    Int32(i32),
    Int64(i64),
    Uint(usize),
    Uint32(u32),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Time(DateTime<Utc>),
    Duration(Duration),
    Uuid(Uuid),
    Url(Url),
    List(Vec<Value>),
    StringList(Vec<String>),
    Map(Settings),
    StringMap(BTreeMap<String, String>),
    AnyMap(BTreeMap<MapKey, Value>),
}

impl Value {
    /// Short name of the value's shape, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Uint(_) => "uint",
            Value::Uint32(_) => "uint32",
            Value::Uint64(_) => "uint64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Time(_) => "time",
            Value::Duration(_) => "duration",
            Value::Uuid(_) => "uuid",
            Value::Url(_) => "url",
            Value::List(_) => "list",
            Value::StringList(_) => "string list",
            Value::Map(_) => "map",
            Value::StringMap(_) => "string map",
            Value::AnyMap(_) => "keyed map",
        }
    }

    /// The [`KeyType`] whose coercion output has this value's representation
    pub fn key_type(&self) -> Option<KeyType> {
        let kind = match self {
            Value::Int(_) => KeyType::Int,
            Value::Int32(_) => KeyType::Int32,
            Value::Int64(_) => KeyType::Int64,
            Value::Uint(_) => KeyType::Uint,
            Value::Uint32(_) => KeyType::Uint32,
            Value::Uint64(_) => KeyType::Uint64,
            Value::Float32(_) => KeyType::Float32,
            Value::Float64(_) => KeyType::Float64,
            Value::String(_) => KeyType::String,
            Value::Bool(_) => KeyType::Bool,
            Value::StringList(_) => KeyType::StringSlice,
            Value::Map(_) => KeyType::Map,
            Value::Time(_) => KeyType::Time,
            Value::Duration(_) => KeyType::Duration,
            Value::Bytes(_) => KeyType::Bytes,
            Value::Uuid(_) => KeyType::Uuid,
            Value::Url(_) => KeyType::Url,
            Value::Null | Value::List(_) | Value::StringMap(_) | Value::AnyMap(_) => return None,
        };
        Some(kind)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Settings> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Render the value as JSON for serde-based decoding and display.
    ///
    /// Times use RFC 3339, durations use humantime text (`"1m 30s"`), UUIDs and
    /// URLs become strings and non-string map keys are stringified.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i as i64),
            Value::Int32(i) => Json::from(*i),
            Value::Int64(i) => Json::from(*i),
            Value::Uint(u) => Json::from(*u as u64),
            Value::Uint32(u) => Json::from(*u),
            Value::Uint64(u) => Json::from(*u),
            Value::Float32(f) => Json::from(*f as f64),
            Value::Float64(f) => Json::from(*f),
            Value::String(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::Array(b.iter().map(|byte| Json::from(*byte)).collect()),
            Value::Time(t) => Json::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Duration(d) => Json::String(humantime::format_duration(*d).to_string()),
            Value::Uuid(u) => Json::String(u.to_string()),
            Value::Url(u) => Json::String(u.to_string()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::StringList(items) => {
                Json::Array(items.iter().cloned().map(Json::String).collect())
            }
            Value::Map(map) => settings_to_json(map),
            Value::StringMap(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Json::String(v.clone())))
                    .collect(),
            ),
            Value::AnyMap(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Render a whole snapshot as a JSON object
pub fn settings_to_json(settings: &Settings) -> serde_json::Value {
    serde_json::Value::Object(
        settings
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Uint(u) => write!(f, "{}", u),
            Value::Uint32(u) => write!(f, "{}", u),
            Value::Uint64(u) => write!(f, "{}", u),
            Value::Float32(x) => write!(f, "{}", x),
            Value::Float64(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
            Value::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Duration(d) => write!(f, "{}", humantime::format_duration(*d)),
            Value::Uuid(u) => write!(f, "{}", u),
            Value::Url(u) => write!(f, "{}", u),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

fn map_key_from_yaml(key: serde_yaml::Value) -> MapKey {
    match key {
        serde_yaml::Value::Bool(b) => MapKey::Bool(b),
        serde_yaml::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => MapKey::Int(i),
            (None, Some(u)) => MapKey::Uint(u),
            _ => MapKey::String(n.to_string()),
        },
        serde_yaml::Value::String(s) => MapKey::String(s),
        serde_yaml::Value::Null => MapKey::String("null".to_string()),
        serde_yaml::Value::Tagged(tagged) => map_key_from_yaml(tagged.value),
        other => MapKey::String(
            serde_yaml::to_string(&other)
                .map(|s| s.trim_end().to_string())
                .unwrap_or_default(),
        ),
    }
}

fn integer_value(signed: Option<i64>, unsigned: Option<u64>) -> Option<Value> {
    match (signed, unsigned) {
        (Some(i), _) => Some(
            isize::try_from(i)
                .map(Value::Int)
                .unwrap_or(Value::Int64(i)),
        ),
        (None, Some(u)) => Some(Value::Uint64(u)),
        _ => None,
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => integer_value(n.as_i64(), n.as_u64())
                .unwrap_or_else(|| Value::Float64(n.as_f64().unwrap_or(f64::NAN))),
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_yaml::Value::Mapping(mapping) => {
                if mapping.keys().all(|k| k.is_string()) {
                    Value::Map(
                        mapping
                            .into_iter()
                            .filter_map(|(k, v)| match k {
                                serde_yaml::Value::String(k) => Some((k, Value::from(v))),
                                _ => None,
                            })
                            .collect(),
                    )
                } else {
                    Value::AnyMap(
                        mapping
                            .into_iter()
                            .map(|(k, v)| (map_key_from_yaml(k), Value::from(v)))
                            .collect(),
                    )
                }
            }
            serde_yaml::Value::Tagged(tagged) => Value::from(tagged.value),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => integer_value(n.as_i64(), n.as_u64())
                .unwrap_or_else(|| Value::Float64(n.as_f64().unwrap_or(f64::NAN))),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    isize => Int,
    i32 => Int32,
    i64 => Int64,
    usize => Uint,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Float32,
    f64 => Float64,
    String => String,
    Vec<u8> => Bytes,
    DateTime<Utc> => Time,
    Duration => Duration,
    Uuid => Uuid,
    Url => Url,
    Vec<Value> => List,
    Vec<String> => StringList,
    Settings => Map,
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
