//! Configuration Loaders
//!
//! Populate a provider from files and the process environment.

pub mod env;
pub mod file;

pub use env::EnvVarLoader;
pub use file::ConfigFileLoader;
