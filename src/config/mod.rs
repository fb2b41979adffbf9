//! Configuration Module
//!
//! The configuration service, its typed snapshot accessor, and struct
//! decoding.

pub mod getter;
pub mod load;
pub mod service;

pub use getter::Getter;
pub use load::Validate;
pub use service::{Config, ConfigBuilder, ReloadEvent};
