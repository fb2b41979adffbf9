//! Configuration Providers
//!
//! Backends that ingest raw settings before they are snapshotted.

pub mod format;
pub mod layered;

pub use format::Format;
pub use layered::LayeredProvider;
