//! scg-config
//!
//! Layered configuration access. Settings are loaded from YAML/JSON files,
//! environment variables and programmatic overrides into one tree, captured
//! as an immutable snapshot, and read back through dot-notation paths with
//! typed conversion:
//!
//! ```no_run
//! use scg_config::{Config, KeyType};
//! use std::path::Path;
//!
//! # fn main() -> scg_config::Result<()> {
//! let config = Config::new();
//! config.file_loader().load_from_file(Path::new("config.yaml"))?;
//! config.reload()?;
//!
//! let port = config.get("server.port", KeyType::Uint32)?;
//! let hosts = config.getter().get_string_slice("server.hosts");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod contract;
pub mod dotmap;
pub mod error;
pub mod loader;
pub mod provider;
pub mod value;
pub mod watcher;

pub use config::{Config, ConfigBuilder, Getter, ReloadEvent, Validate};
pub use contract::{ChangeCallback, EnvLoader, FileLoader, Provider, ValueAccessor, Watcher};
pub use error::{CoercionError, CoercionReason, ConfigError, DecodeError, FieldViolation};
pub use loader::{ConfigFileLoader, EnvVarLoader};
pub use provider::LayeredProvider;
pub use value::{KeyType, MapKey, Settings, Value};
pub use watcher::FileWatcher;

/// Common result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
