//! Configuration model for deploylock.
//!
//! This module defines the Config struct that represents `.deploylock.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! sensible defaults for optional fields, and validation of config values.
//!
//! The config object is threaded explicitly into every coordinator; nothing
//! in the lock paths reads ambient process state.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use model::Config;
pub use types::DEFAULT_CONFIG_FILE;
