//! Weakly typed serde decoding of [`Value`] trees
//!
//! Environment variables arrive as strings, so a field asking for a number or
//! a bool also accepts text that parses as one (`"8080"`, `"true"`). Fields
//! asking for a string accept numbers and bools, and a lone scalar fills a
//! one-element sequence. Everything else decodes by the value's own shape.

use super::coerce::{parse_bool, to_float64, to_int64, to_uint64};
use super::{MapKey, Settings, Value};
use crate::error::DecodeError;
use serde::de::value::{MapAccessDeserializer, MapDeserializer, SeqDeserializer};
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, Error as _, IntoDeserializer, MapAccess, SeqAccess,
    Visitor,
};
use std::collections::btree_map;

/// Decode `T` from a value tree
pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, DecodeError> {
    T::deserialize(ValueDeserializer::new(value))
}

/// Decode `T` from a whole snapshot
pub fn from_settings<T: DeserializeOwned>(settings: Settings) -> Result<T, DecodeError> {
    from_value(&Value::Map(settings))
}

impl de::Error for DecodeError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        DecodeError::new(msg.to_string())
    }
}

#[derive(Clone, Copy)]
pub struct ValueDeserializer<'a> {
    value: &'a Value,
}

impl<'a> ValueDeserializer<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { value }
    }

    fn scalar_text(&self) -> Option<String> {
        match self.value {
            Value::Bool(_)
            | Value::Int(_)
            | Value::Int32(_)
            | Value::Int64(_)
            | Value::Uint(_)
            | Value::Uint32(_)
            | Value::Uint64(_)
            | Value::Float32(_)
            | Value::Float64(_) => Some(self.value.to_string()),
            _ => None,
        }
    }
}

macro_rules! deserialize_signed {
    ($($method:ident)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
            match self.value {
                Value::String(_) => visitor.visit_i64(to_int64(self.value).map_err(DecodeError::custom)?),
                Value::Bool(b) => visitor.visit_i64(i64::from(*b)),
                _ => self.deserialize_any(visitor),
            }
        }
    )*};
}

macro_rules! deserialize_unsigned {
    ($($method:ident)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
            match self.value {
                Value::String(_) => visitor.visit_u64(to_uint64(self.value).map_err(DecodeError::custom)?),
                Value::Bool(b) => visitor.visit_u64(u64::from(*b)),
                _ => self.deserialize_any(visitor),
            }
        }
    )*};
}

macro_rules! deserialize_float {
    ($($method:ident)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
            match self.value {
                Value::String(_) => visitor.visit_f64(to_float64(self.value).map_err(DecodeError::custom)?),
                _ => self.deserialize_any(visitor),
            }
        }
    )*};
}

impl<'de, 'a> de::Deserializer<'de> for ValueDeserializer<'a> {
    type Error = DecodeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::Int(i) => visitor.visit_i64(*i as i64),
            Value::Int32(i) => visitor.visit_i32(*i),
            Value::Int64(i) => visitor.visit_i64(*i),
            Value::Uint(u) => visitor.visit_u64(*u as u64),
            Value::Uint32(u) => visitor.visit_u32(*u),
            Value::Uint64(u) => visitor.visit_u64(*u),
            Value::Float32(f) => visitor.visit_f32(*f),
            Value::Float64(f) => visitor.visit_f64(*f),
            Value::String(s) => visitor.visit_str(s),
            Value::Time(_) | Value::Duration(_) | Value::Uuid(_) | Value::Url(_) => {
                visitor.visit_string(self.value.to_string())
            }
            Value::Bytes(bytes) => {
                let mut seq = SeqDeserializer::new(bytes.iter().copied());
                let out = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(out)
            }
            Value::List(items) => visitor.visit_seq(ListAccess {
                items: items.iter(),
            }),
            Value::StringList(items) => {
                let mut seq = SeqDeserializer::new(items.iter().map(String::as_str));
                let out = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(out)
            }
            Value::Map(map) => visitor.visit_map(SettingsAccess {
                entries: map.iter(),
                pending: None,
            }),
            Value::StringMap(map) => {
                let mut access =
                    MapDeserializer::new(map.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                let out = visitor.visit_map(&mut access)?;
                access.end()?;
                Ok(out)
            }
            Value::AnyMap(map) => visitor.visit_map(KeyedAccess {
                entries: map.iter(),
                pending: None,
            }),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::String(s) => match parse_bool(s) {
                Some(b) => visitor.visit_bool(b),
                None => Err(DecodeError::invalid_value(
                    de::Unexpected::Str(s.as_str()),
                    &"a boolean",
                )),
            },
            _ => self.deserialize_any(visitor),
        }
    }

    deserialize_signed!(deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64);
    deserialize_unsigned!(deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64);
    deserialize_float!(deserialize_f32 deserialize_f64);

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.scalar_text() {
            Some(text) => visitor.visit_string(text),
            None => self.deserialize_any(visitor),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::Null
            | Value::List(_)
            | Value::StringList(_)
            | Value::Bytes(_)
            | Value::Map(_)
            | Value::StringMap(_)
            | Value::AnyMap(_) => self.deserialize_any(visitor),
            single => visitor.visit_seq(ListAccess {
                items: std::slice::from_ref(single).iter(),
            }),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        match self.value {
            Value::String(s) => visitor.visit_enum(s.as_str().into_deserializer()),
            Value::Map(map) if map.len() == 1 => {
                visitor.visit_enum(MapAccessDeserializer::new(SettingsAccess {
                    entries: map.iter(),
                    pending: None,
                }))
            }
            other => Err(DecodeError::custom(format!(
                "expected an enum variant name or single-key map, found {}",
                other.kind_name()
            ))),
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        i128 u128 char bytes byte_buf unit unit_struct tuple tuple_struct map struct identifier
    }
}

struct ListAccess<'a> {
    items: std::slice::Iter<'a, Value>,
}

impl<'de, 'a> SeqAccess<'de> for ListAccess<'a> {
    type Error = DecodeError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, DecodeError> {
        self.items
            .next()
            .map(|item| seed.deserialize(ValueDeserializer::new(item)))
            .transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

struct SettingsAccess<'a> {
    entries: btree_map::Iter<'a, String, Value>,
    pending: Option<&'a Value>,
}

impl<'de, 'a> MapAccess<'de> for SettingsAccess<'a> {
    type Error = DecodeError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, DecodeError> {
        let Some((key, value)) = self.entries.next() else {
            return Ok(None);
        };
        self.pending = Some(value);
        seed.deserialize(key.as_str().into_deserializer()).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, DecodeError> {
        let value = self
            .pending
            .take()
            .ok_or_else(|| DecodeError::custom("map value requested before its key"))?;
        seed.deserialize(ValueDeserializer::new(value))
    }
}

struct KeyedAccess<'a> {
    entries: btree_map::Iter<'a, MapKey, Value>,
    pending: Option<&'a Value>,
}

impl<'de, 'a> MapAccess<'de> for KeyedAccess<'a> {
    type Error = DecodeError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, DecodeError> {
        let Some((key, value)) = self.entries.next() else {
            return Ok(None);
        };
        self.pending = Some(value);
        seed.deserialize(key.to_string().into_deserializer()).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, DecodeError> {
        let value = self
            .pending
            .take()
            .ok_or_else(|| DecodeError::custom("map value requested before its key"))?;
        seed.deserialize(ValueDeserializer::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::{BTreeMap, HashMap};
    use std::time::Duration;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Mode {
        Fast,
        Safe,
    }

    #[derive(Debug, Deserialize)]
    struct Server {
        port: u16,
        debug: bool,
        ratio: f32,
        name: String,
        #[serde(default)]
        tags: Vec<String>,
        mode: Mode,
        #[serde(with = "humantime_serde")]
        timeout: Duration,
        #[serde(default)]
        limits: HashMap<String, u32>,
        fallback: Option<String>,
    }

    fn settings(entries: Vec<(&str, Value)>) -> Settings {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_strings_decode_into_typed_fields() {
        let server: Server = from_settings(settings(vec![
            ("port", Value::from("8080")),
            ("debug", Value::from("true")),
            ("ratio", Value::from("0.5")),
            ("name", Value::Int(42)),
            ("tags", Value::from("solo")),
            ("mode", Value::from("safe")),
            ("timeout", Value::from("1m 30s")),
            (
                "limits",
                Value::Map(settings(vec![("conn", Value::from("10"))])),
            ),
            ("fallback", Value::Null),
        ]))
        .unwrap();

        assert_eq!(server.port, 8080);
        assert!(server.debug);
        assert_eq!(server.ratio, 0.5);
        assert_eq!(server.name, "42");
        assert_eq!(server.tags, vec!["solo"]);
        assert_eq!(server.mode, Mode::Safe);
        assert_eq!(server.timeout, Duration::from_secs(90));
        assert_eq!(server.limits["conn"], 10);
        assert_eq!(server.fallback, None);
    }

    #[test]
    fn test_native_values_decode() {
        let server: Server = from_settings(settings(vec![
            ("port", Value::Int(443)),
            ("debug", Value::Bool(false)),
            ("ratio", Value::Float64(1.5)),
            ("name", Value::from("edge")),
            (
                "tags",
                Value::List(vec![Value::from("a"), Value::from("b")]),
            ),
            ("mode", Value::from("fast")),
            ("timeout", Value::Duration(Duration::from_secs(5))),
            ("fallback", Value::from("backup")),
        ]))
        .unwrap();

        assert_eq!(server.port, 443);
        assert!(!server.debug);
        assert_eq!(server.tags, vec!["a", "b"]);
        assert_eq!(server.mode, Mode::Fast);
        assert_eq!(server.timeout, Duration::from_secs(5));
        assert_eq!(server.fallback.as_deref(), Some("backup"));
        assert!(server.limits.is_empty());
    }

    #[test]
    fn test_decode_failures() {
        #[derive(Debug, Deserialize)]
        struct Port {
            #[allow(dead_code)]
            port: u16,
        }

        let err = from_settings::<Port>(settings(vec![("port", Value::from("http"))])).unwrap_err();
        assert!(err.to_string().contains("not a uint64"), "{err}");

        let err = from_settings::<Port>(settings(vec![("port", Value::Int(70_000))])).unwrap_err();
        assert!(err.to_string().contains("70000"), "{err}");

        let err = from_settings::<Port>(settings(vec![("port", Value::from("-1"))])).unwrap_err();
        assert!(err.to_string().contains("negative"), "{err}");

        #[derive(Debug, Deserialize)]
        struct Flag {
            #[allow(dead_code)]
            on: bool,
        }
        let err = from_settings::<Flag>(settings(vec![("on", Value::from("yes"))])).unwrap_err();
        assert!(err.to_string().contains("a boolean"), "{err}");
    }

    #[test]
    fn test_non_string_keys_and_string_maps() {
        let mut keyed = BTreeMap::new();
        keyed.insert(MapKey::Int(1), Value::from("one"));
        keyed.insert(MapKey::Bool(true), Value::from("yes"));
        let decoded: HashMap<String, String> = from_value(&Value::AnyMap(keyed)).unwrap();
        assert_eq!(decoded["1"], "one");
        assert_eq!(decoded["true"], "yes");

        let strings = BTreeMap::from([("k".to_string(), "v".to_string())]);
        let decoded: HashMap<String, String> = from_value(&Value::StringMap(strings)).unwrap();
        assert_eq!(decoded["k"], "v");

        let bytes: Vec<u8> = from_value(&Value::Bytes(vec![1, 2, 3])).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }
}
