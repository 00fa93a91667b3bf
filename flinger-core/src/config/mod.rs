//! Configuration management.
//!
//! - [`types`]: the schema ([`FlingerConfig`] and its sections).
//! - [`defaults`]: default values and the accepted value lists.
//! - [`loader`]: [`ConfigLoader`], which reads, parses and validates `config.toml`.

pub mod defaults;
pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{BinderConfig, BufferQueueConfig, FlingerConfig, LoggingConfig, StereoConfig};
