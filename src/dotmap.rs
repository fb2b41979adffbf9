//! Dot-notation traversal of nested settings
//!
//! `resolve` walks a path like `server.hosts.0.name` through maps and lists.
//! An exact-case walk is tried first; only if it finds nothing is the whole
//! path walked again from the root with case-insensitive key matching, so an
//! exact key always wins over a differently-cased one.

use crate::value::{MapKey, Settings, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Resolve a dot-separated `path` against `root`.
///
/// Returns `None` for an empty root, an empty path, any missing step, an
/// out-of-range index, or a path that ends on `Value::Null`. Elements of
/// string-only containers come back owned; everything else is borrowed.
pub fn resolve<'a>(root: &'a Settings, path: &str) -> Option<Cow<'a, Value>> {
    if root.is_empty() || path.is_empty() {
        return None;
    }

    let segments: Vec<&str> = path.split('.').collect();

    walk(root, &segments, false).or_else(|| walk(root, &segments, true))
}

fn walk<'a>(root: &'a Settings, segments: &[&str], fold: bool) -> Option<Cow<'a, Value>> {
    let (first, rest) = segments.split_first()?;

    let mut current = Cow::Borrowed(lookup_map(root, first, fold)?);
    for segment in rest {
        // owned values are leaves of string-only containers
        let Cow::Borrowed(node) = current else {
            return None;
        };
        current = step(node, segment, fold)?;
    }

    if current.is_null() {
        return None;
    }
    Some(current)
}

fn step<'a>(node: &'a Value, segment: &str, fold: bool) -> Option<Cow<'a, Value>> {
    if segment.is_empty() {
        return None;
    }

    match node {
        Value::List(items) => items.get(index(segment)?).map(Cow::Borrowed),
        Value::StringList(items) => items
            .get(index(segment)?)
            .map(|s| Cow::Owned(Value::String(s.clone()))),
        Value::Map(map) => lookup_map(map, segment, fold).map(Cow::Borrowed),
        Value::StringMap(map) => lookup_string_map(map, segment, fold)
            .map(|s| Cow::Owned(Value::String(s.clone()))),
        Value::AnyMap(map) => lookup_any_map(map, segment, fold).map(Cow::Borrowed),
        _ => None,
    }
}

fn index(segment: &str) -> Option<usize> {
    segment.parse::<usize>().ok()
}

/// Unicode-aware case-insensitive comparison without allocating
pub fn eq_fold(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

fn lookup_map<'a>(map: &'a Settings, key: &str, fold: bool) -> Option<&'a Value> {
    if key.is_empty() {
        return None;
    }
    if !fold {
        return map.get(key);
    }
    map.iter().find(|(k, _)| eq_fold(k, key)).map(|(_, v)| v)
}

fn lookup_string_map<'a>(map: &'a BTreeMap<String, String>, key: &str, fold: bool) -> Option<&'a String> {
    if !fold {
        return map.get(key);
    }
    map.iter().find(|(k, _)| eq_fold(k, key)).map(|(_, v)| v)
}

fn lookup_any_map<'a>(map: &'a BTreeMap<MapKey, Value>, key: &str, fold: bool) -> Option<&'a Value> {
    if !fold {
        return map.get(&MapKey::String(key.to_string()));
    }
    map.iter()
        .find(|(k, _)| k.as_str().is_some_and(|k| eq_fold(k, key)))
        .map(|(_, v)| v)
}

/// Write `value` at a dotted `path`, creating intermediate maps and replacing
/// any non-map value that sits in the way.
pub fn set_path(root: &mut Settings, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = root;

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }

        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Map(Settings::new()));
        if !matches!(slot, Value::Map(_)) {
            *slot = Value::Map(Settings::new());
        }
        let Value::Map(next) = slot else {
            return;
        };
        current = next;
    }
}

/// Merge `src` into `dst`. Maps present on both sides merge recursively;
/// anything else in `src` replaces what `dst` had.
pub fn deep_merge(dst: &mut Settings, src: Settings) {
    for (key, incoming) in src {
        match (dst.get_mut(&key), incoming) {
            (Some(Value::Map(existing)), Value::Map(incoming)) => deep_merge(existing, incoming),
            (_, incoming) => {
                dst.insert(key, incoming);
            }
        }
    }
}

/// Lower-case every key, recursively. Keyed maps become string-keyed maps.
pub fn lowercase_keys(settings: Settings) -> Settings {
    let mut out = Settings::new();
    for (key, value) in settings {
        let value = lowercase_value(value);
        match (out.get_mut(&key.to_lowercase()), value) {
            (Some(Value::Map(existing)), Value::Map(incoming)) => deep_merge(existing, incoming),
            (_, value) => {
                out.insert(key.to_lowercase(), value);
            }
        }
    }
    out
}

fn lowercase_value(value: Value) -> Value {
    match value {
        Value::Map(map) => Value::Map(lowercase_keys(map)),
        Value::AnyMap(map) => Value::Map(lowercase_keys(
            map.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        )),
        Value::StringMap(map) => Value::StringMap(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
        ),
        Value::List(items) => Value::List(items.into_iter().map(lowercase_value).collect()),
        other => other,
    }
}

/// Every dotted path in `settings` that ends on a non-map value
pub fn leaf_paths(settings: &Settings) -> Vec<String> {
    let mut paths = Vec::new();
    collect_leaves(settings, "", &mut paths);
    paths
}

fn collect_leaves(settings: &Settings, prefix: &str, out: &mut Vec<String>) {
    for (key, value) in settings {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Map(nested) if !nested.is_empty() => collect_leaves(nested, &path, out),
            _ => out.push(path),
        }
    }
}
