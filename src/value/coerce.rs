//! Type Coercion Table
//!
//! Pure conversions from an untyped [`Value`] into the representation of one
//! [`KeyType`]. Numeric conversions are range checked, never truncated to fit.
//! The table is built once and only read afterwards.

use super::{KeyType, Settings, Value};
use crate::error::{CoercionError, CoercionReason, ConfigError};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::num::IntErrorKind;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Converts a value into the representation of one [`KeyType`]
pub type Converter = fn(&Value) -> Result<Value, CoercionError>;

static CONVERTERS: Lazy<HashMap<KeyType, Converter>> = Lazy::new(|| {
    let entries: [(KeyType, Converter); 17] = [
        (KeyType::Int, |v| to_int(v).map(Value::Int)),
        (KeyType::Int32, |v| to_int32(v).map(Value::Int32)),
        (KeyType::Int64, |v| to_int64(v).map(Value::Int64)),
        (KeyType::Uint, |v| to_uint(v).map(Value::Uint)),
        (KeyType::Uint32, |v| to_uint32(v).map(Value::Uint32)),
        (KeyType::Uint64, |v| to_uint64(v).map(Value::Uint64)),
        (KeyType::Float32, |v| to_float32(v).map(Value::Float32)),
        (KeyType::Float64, |v| to_float64(v).map(Value::Float64)),
        (KeyType::String, |v| to_string(v).map(Value::String)),
        (KeyType::Bool, |v| to_bool(v).map(Value::Bool)),
        (KeyType::StringSlice, |v| to_string_slice(v).map(Value::StringList)),
        (KeyType::Map, |v| to_map(v).map(Value::Map)),
        (KeyType::Time, |v| to_time(v).map(Value::Time)),
        (KeyType::Duration, |v| to_duration(v).map(Value::Duration)),
        (KeyType::Bytes, |v| to_bytes(v).map(Value::Bytes)),
        (KeyType::Uuid, |v| to_uuid(v).map(Value::Uuid)),
        (KeyType::Url, |v| to_url(v).map(Value::Url)),
    ];
    entries.into_iter().collect()
});

/// Convert `value` to the representation of `kind`
pub fn coerce(value: &Value, kind: KeyType) -> Result<Value, ConfigError> {
    let converter = CONVERTERS
        .get(&kind)
        .ok_or_else(|| ConfigError::UnknownType(kind.to_string()))?;
    converter(value).map_err(ConfigError::from)
}

/// Convert `value` to the type named `type_name` (`"int"`, `"[]string"`, ...)
pub fn coerce_named(value: &Value, type_name: &str) -> Result<Value, ConfigError> {
    coerce(value, type_name.parse()?)
}

/// Integer view of a numeric value, wide enough for every integer variant
enum Number {
    Signed(i128),
    Float(f64),
}

fn number(value: &Value) -> Option<Number> {
    let n = match value {
        Value::Int(i) => Number::Signed(*i as i128),
        Value::Int32(i) => Number::Signed(*i as i128),
        Value::Int64(i) => Number::Signed(*i as i128),
        Value::Uint(u) => Number::Signed(*u as i128),
        Value::Uint32(u) => Number::Signed(*u as i128),
        Value::Uint64(u) => Number::Signed(*u as i128),
        Value::Float32(f) => Number::Float(*f as f64),
        Value::Float64(f) => Number::Float(*f),
        _ => return None,
    };
    Some(n)
}

fn integer<T: TryFrom<i128>>(value: &Value, kind: KeyType) -> Result<T, CoercionError> {
    let unsigned = matches!(kind, KeyType::Uint | KeyType::Uint32 | KeyType::Uint64);

    let wide = match value {
        Value::String(s) => s.parse::<i128>().map_err(|e| match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                CoercionError::out_of_range(kind)
            }
            _ => CoercionError::parse(kind, e),
        })?,
        other => match number(other) {
            Some(Number::Signed(i)) => i,
            Some(Number::Float(f)) => {
                // i128 is wider than every target
                if !f.is_finite() || f >= i128::MAX as f64 || f <= i128::MIN as f64 {
                    return Err(CoercionError::out_of_range(kind));
                }
                f.trunc() as i128
            }
            None => return Err(CoercionError::mismatch(kind, other.kind_name())),
        },
    };

    if unsigned && wide < 0 {
        return Err(CoercionError::new(kind, CoercionReason::Negative));
    }
    T::try_from(wide).map_err(|_| CoercionError::out_of_range(kind))
}

pub fn to_int(value: &Value) -> Result<isize, CoercionError> {
    integer(value, KeyType::Int)
}

pub fn to_int32(value: &Value) -> Result<i32, CoercionError> {
    integer(value, KeyType::Int32)
}

pub fn to_int64(value: &Value) -> Result<i64, CoercionError> {
    integer(value, KeyType::Int64)
}

pub fn to_uint(value: &Value) -> Result<usize, CoercionError> {
    integer(value, KeyType::Uint)
}

pub fn to_uint32(value: &Value) -> Result<u32, CoercionError> {
    integer(value, KeyType::Uint32)
}

pub fn to_uint64(value: &Value) -> Result<u64, CoercionError> {
    integer(value, KeyType::Uint64)
}

pub fn to_float32(value: &Value) -> Result<f32, CoercionError> {
    let kind = KeyType::Float32;
    let wide = match value {
        Value::Float32(f) => return Ok(*f),
        Value::String(s) => s.parse::<f64>().map_err(|e| CoercionError::parse(kind, e))?,
        other => match number(other) {
            Some(Number::Float(f)) => f,
            Some(Number::Signed(i)) => i as f64,
            None => return Err(CoercionError::mismatch(kind, other.kind_name())),
        },
    };

    if wide.abs() > f32::MAX as f64 {
        return Err(CoercionError::out_of_range(kind));
    }
    Ok(wide as f32)
}

pub fn to_float64(value: &Value) -> Result<f64, CoercionError> {
    let kind = KeyType::Float64;
    match value {
        Value::String(s) => s.parse::<f64>().map_err(|e| CoercionError::parse(kind, e)),
        other => match number(other) {
            Some(Number::Float(f)) => Ok(f),
            Some(Number::Signed(i)) => Ok(i as f64),
            None => Err(CoercionError::mismatch(kind, other.kind_name())),
        },
    }
}

/// Only an actual string is accepted; nothing is stringified implicitly
pub fn to_string(value: &Value) -> Result<String, CoercionError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(CoercionError::mismatch(KeyType::String, other.kind_name())),
    }
}

/// Parse the canonical boolean spellings
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

pub fn to_bool(value: &Value) -> Result<bool, CoercionError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => parse_bool(s).ok_or_else(|| {
            CoercionError::parse(KeyType::Bool, format!("invalid boolean text {:?}", s))
        }),
        other => Err(CoercionError::mismatch(KeyType::Bool, other.kind_name())),
    }
}

pub fn to_string_slice(value: &Value) -> Result<Vec<String>, CoercionError> {
    match value {
        Value::StringList(items) => Ok(items.clone()),
        Value::List(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(CoercionError::new(
                    KeyType::StringSlice,
                    CoercionReason::NonStringElement { index },
                )),
            })
            .collect(),
        other => Err(CoercionError::mismatch(KeyType::StringSlice, other.kind_name())),
    }
}

pub fn to_map(value: &Value) -> Result<Settings, CoercionError> {
    match value {
        Value::Map(map) => Ok(map.clone()),
        other => Err(CoercionError::mismatch(KeyType::Map, other.kind_name())),
    }
}

pub fn to_time(value: &Value) -> Result<DateTime<Utc>, CoercionError> {
    match value {
        Value::Time(t) => Ok(*t),
        other => Err(CoercionError::mismatch(KeyType::Time, other.kind_name())),
    }
}

pub fn to_duration(value: &Value) -> Result<Duration, CoercionError> {
    match value {
        Value::Duration(d) => Ok(*d),
        other => Err(CoercionError::mismatch(KeyType::Duration, other.kind_name())),
    }
}

pub fn to_bytes(value: &Value) -> Result<Vec<u8>, CoercionError> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        other => Err(CoercionError::mismatch(KeyType::Bytes, other.kind_name())),
    }
}

pub fn to_uuid(value: &Value) -> Result<Uuid, CoercionError> {
    match value {
        Value::Uuid(u) => Ok(*u),
        Value::String(s) => Uuid::parse_str(s).map_err(|e| CoercionError::parse(KeyType::Uuid, e)),
        other => Err(CoercionError::mismatch(KeyType::Uuid, other.kind_name())),
    }
}

/// Strings must be absolute URLs. Relative references such as `/api/v1`
/// have no base to resolve against and are rejected.
pub fn to_url(value: &Value) -> Result<Url, CoercionError> {
    match value {
        Value::Url(u) => Ok(u.clone()),
        Value::String(s) => Url::parse(s).map_err(|e| CoercionError::parse(KeyType::Url, e)),
        other => Err(CoercionError::mismatch(KeyType::Url, other.kind_name())),
    }
}
