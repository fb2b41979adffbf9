//! Error Types
//!
//! Every failure in the crate is a [`ConfigError`]. Conversion failures carry a
//! [`CoercionError`] that names the requested [`KeyType`] and why the value
//! could not be converted, so callers can tell a `NotInt` from a `NotUuid`.

use crate::value::KeyType;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why a value could not be converted to the requested type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoercionReason {
    /// The value has a shape the target type does not accept
    Mismatch { found: &'static str },
    /// The value does not fit the target's representable range
    OutOfRange,
    /// A negative value was given for an unsigned target
    Negative,
    /// A string could not be parsed as the target type
    Parse(String),
    /// A sequence element at `index` is not a string
    NonStringElement { index: usize },
}

impl fmt::Display for CoercionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoercionReason::Mismatch { found } => write!(f, "found {}", found),
            CoercionReason::OutOfRange => f.write_str("out of range"),
            CoercionReason::Negative => f.write_str("negative value"),
            CoercionReason::Parse(msg) => write!(f, "{}", msg),
            CoercionReason::NonStringElement { index } => {
                write!(f, "element {} is not a string", index)
            }
        }
    }
}

/// A failed conversion to a specific [`KeyType`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not {}: {reason}", .target.described())]
pub struct CoercionError {
    target: KeyType,
    reason: CoercionReason,
}

impl CoercionError {
    pub fn new(target: KeyType, reason: CoercionReason) -> Self {
        Self { target, reason }
    }

    pub fn mismatch(target: KeyType, found: &'static str) -> Self {
        Self::new(target, CoercionReason::Mismatch { found })
    }

    pub fn out_of_range(target: KeyType) -> Self {
        Self::new(target, CoercionReason::OutOfRange)
    }

    pub fn parse(target: KeyType, err: impl fmt::Display) -> Self {
        Self::new(target, CoercionReason::Parse(err.to_string()))
    }

    /// The type the conversion was aiming for
    pub fn target(&self) -> KeyType {
        self.target
    }

    pub fn reason(&self) -> &CoercionReason {
        &self.reason
    }
}

/// A single failed rule reported by [`crate::config::Validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Dotted path of the offending field
    pub field: String,
    /// Name of the rule that failed (e.g. `required`, `min`)
    pub rule: String,
    /// Rule parameter, if the rule takes one
    pub param: Option<String>,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule: rule.into(),
            param: None,
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }
}

fn describe_violations(violations: &[FieldViolation]) -> String {
    let mut msg = String::new();
    for violation in violations {
        msg.push_str(&format!(" field '{}' failed '{}'", violation.field, violation.rule));
        if let Some(param) = &violation.param {
            msg.push_str(&format!("='{}'", param));
        }
        msg.push(';');
    }
    msg
}

/// Main error type for configuration access, loading and watching
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config: key not found: {key}")]
    KeyNotFound { key: String },

    #[error("config: wrong type for key: {key}")]
    WrongType {
        key: String,
        #[source]
        source: CoercionError,
    },

    #[error("config: unknown type for key: {0}")]
    UnknownType(String),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("no provider set for environment loader")]
    ProviderNotSet,

    #[error("provider has no config source set")]
    NoConfigSource,

    #[error("failed to read configuration file {}", .path.display())]
    ReadConfigFile {
        path: PathBuf,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("failed to read directory {}", .path.display())]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load initial config file {}", .path.display())]
    LoadFile {
        path: PathBuf,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("failed to merge config file {}", .path.display())]
    MergeFile {
        path: PathBuf,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML config {}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to parse JSON config {}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported config file extension: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("config root is not a mapping: {}", .path.display())]
    InvalidRoot { path: PathBuf },

    #[error("error reading config")]
    ReadConfig(#[source] Box<ConfigError>),

    #[error("error reloading config")]
    Reload(#[source] Box<ConfigError>),

    #[error("file watcher error{}", .path.as_ref().map(|p| format!(" for {}", p.display())).unwrap_or_default())]
    Watch {
        path: Option<PathBuf>,
        #[source]
        source: notify::Error,
    },

    #[error("file watcher requires a running tokio runtime")]
    NoRuntime,

    #[error("config: failed to decode settings into target type")]
    Decode(#[source] DecodeError),

    #[error("config validation failed:{}", describe_violations(.0))]
    Validation(Vec<FieldViolation>),
}

/// Failure while decoding a snapshot into a caller's type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct DecodeError(String);

impl DecodeError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl ConfigError {
    /// True when the key was absent from both flat and path lookup
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::KeyNotFound { .. })
    }

    /// The conversion failure behind this error, whichever lookup path produced it
    pub fn coercion(&self) -> Option<&CoercionError> {
        match self {
            ConfigError::Coercion(err) | ConfigError::WrongType { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coercion_error_display() {
        let err = CoercionError::out_of_range(KeyType::Int);
        assert_eq!(err.to_string(), "not an int: out of range");

        let err = CoercionError::new(KeyType::StringSlice, CoercionReason::NonStringElement { index: 2 });
        assert_eq!(err.to_string(), "not a string slice: element 2 is not a string");
    }

    #[test]
    fn test_validation_display() {
        let err = ConfigError::Validation(vec![
            FieldViolation::new("Server.Port", "min").with_param("1"),
            FieldViolation::new("Name", "required"),
        ]);
        assert_eq!(
            err.to_string(),
            "config validation failed: field 'Server.Port' failed 'min'='1'; field 'Name' failed 'required';"
        );
    }

    #[test]
    fn test_coercion_accessor() {
        let inner = CoercionError::mismatch(KeyType::Bool, "list");
        let err = ConfigError::WrongType {
            key: "a.b".into(),
            source: inner.clone(),
        };
        assert_eq!(err.coercion(), Some(&inner));
        assert!(!err.is_not_found());
        assert!(ConfigError::KeyNotFound { key: "x".into() }.is_not_found());
    }
}
