//! Target type tags for typed lookups

use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

/// Identifies the type a configuration value should be converted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyType {
    Int,
    Int32,
    Int64,
    Uint,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    Bool,
    StringSlice,
    Map,
    Time,
    Duration,
    Bytes,
    Uuid,
    Url,
}

impl KeyType {
    /// Every supported tag, in declaration order
    pub const ALL: [KeyType; 17] = [
        KeyType::Int,
        KeyType::Int32,
        KeyType::Int64,
        KeyType::Uint,
        KeyType::Uint32,
        KeyType::Uint64,
        KeyType::Float32,
        KeyType::Float64,
        KeyType::String,
        KeyType::Bool,
        KeyType::StringSlice,
        KeyType::Map,
        KeyType::Time,
        KeyType::Duration,
        KeyType::Bytes,
        KeyType::Uuid,
        KeyType::Url,
    ];

    /// Canonical name of the tag, as accepted by [`FromStr`]
    pub fn name(self) -> &'static str {
        match self {
            KeyType::Int => "int",
            KeyType::Int32 => "int32",
            KeyType::Int64 => "int64",
            KeyType::Uint => "uint",
            KeyType::Uint32 => "uint32",
            KeyType::Uint64 => "uint64",
            KeyType::Float32 => "float32",
            KeyType::Float64 => "float64",
            KeyType::String => "string",
            KeyType::Bool => "bool",
            KeyType::StringSlice => "[]string",
            KeyType::Map => "map",
            KeyType::Time => "time",
            KeyType::Duration => "duration",
            KeyType::Bytes => "bytes",
            KeyType::Uuid => "uuid",
            KeyType::Url => "url",
        }
    }

    /// Human-readable noun phrase used in conversion errors ("an int", "a URL")
    pub(crate) fn described(self) -> &'static str {
        match self {
            KeyType::Int => "an int",
            KeyType::Int32 => "an int32",
            KeyType::Int64 => "an int64",
            KeyType::Uint => "a uint",
            KeyType::Uint32 => "a uint32",
            KeyType::Uint64 => "a uint64",
            KeyType::Float32 => "a float32",
            KeyType::Float64 => "a float64",
            KeyType::String => "a string",
            KeyType::Bool => "a bool",
            KeyType::StringSlice => "a string slice",
            KeyType::Map => "a map",
            KeyType::Time => "a time",
            KeyType::Duration => "a duration",
            KeyType::Bytes => "bytes",
            KeyType::Uuid => "a uuid",
            KeyType::Url => "a URL",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyType::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ConfigError::UnknownType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in KeyType::ALL {
            assert_eq!(kind.name().parse::<KeyType>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_name() {
        let err = "complex128".parse::<KeyType>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownType(ref name) if name == "complex128"));
    }

    #[test]
    fn test_display() {
        assert_eq!(KeyType::StringSlice.to_string(), "[]string");
        assert_eq!(KeyType::Url.to_string(), "url");
    }
}
