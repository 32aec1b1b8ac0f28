//! Plugin configuration results for the Strata asset engine.
//!
//! Plugin discovery and config-file parsing happen outside the engine; this
//! crate defines the *result* shape the engine consumes, the request record
//! kept for dependency tracking, and the host callback through which configs
//! are obtained.

#![warn(missing_docs)]

pub mod error;
pub mod types;

pub use error::ConfigLoadError;
pub use types::{ConfigRequest, ConfigSource, PluginConfig, ReloadMode};
