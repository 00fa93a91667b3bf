//! # stereoflinger core (`flinger-core`)
//!
//! Ambient services shared by every stereoflinger crate:
//!
//! - **Error handling**: [`CoreError`] and [`ConfigError`], built with `thiserror`.
//! - **Configuration**: [`FlingerConfig`] loaded from TOML by [`ConfigLoader`],
//!   with defaults for every field and validation of the result.
//! - **Logging**: `tracing` subscriber setup (console, optional rolling file,
//!   text or JSON).
//!
//! ```rust,ignore
//! use flinger_core::{ConfigLoader, CoreError, init_logging};
//!
//! fn main() -> Result<(), CoreError> {
//!     let config = ConfigLoader::load()?;
//!     init_logging(&config.logging)?;
//!     tracing::info!("stereoflinger core initialized");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod utils;

pub use config::{BinderConfig, BufferQueueConfig, ConfigLoader, FlingerConfig, LoggingConfig, StereoConfig};
pub use error::{ConfigError, CoreError};
pub use logging::{init_logging, init_minimal_logging};
