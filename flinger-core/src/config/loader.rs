//! Configuration loading.
//!
//! [`ConfigLoader`] locates `config.toml`, parses it into a [`FlingerConfig`]
//! and validates the result. A missing file is not an error: the defaults are
//! used instead.
//!
//! ```rust,ignore
//! use flinger_core::config::ConfigLoader;
//!
//! match ConfigLoader::load() {
//!     Ok(config) => println!("render mode: {}", config.stereo.render_mode),
//!     Err(e) => {
//!         flinger_core::logging::init_minimal_logging();
//!         tracing::error!("Configuration loading failed: {}", e);
//!     }
//! }
//! ```

use std::fs;
use std::path::Path;

use super::defaults::{LOG_FORMATS, LOG_LEVELS, MAX_BUFFER_COUNT, MIN_BUFFER_COUNT, RENDER_MODES};
use super::types::FlingerConfig;
use crate::error::{ConfigError, CoreError};
use crate::utils::paths::get_app_config_dir;

/// File name looked up inside the application configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Namespace for the configuration loading functions.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `config.toml` from the application configuration directory.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be determined, the file exists but cannot
    /// be read or parsed, or validation rejects a value.
    pub fn load() -> Result<FlingerConfig, CoreError> {
        let path = get_app_config_dir()?.join(CONFIG_FILE_NAME);
        Self::load_from_path(&path)
    }

    /// Loads and validates the configuration at `path`; a missing file yields
    /// the validated defaults.
    pub fn load_from_path(path: &Path) -> Result<FlingerConfig, CoreError> {
        match fs::read_to_string(path) {
            Ok(content) => {
                tracing::debug!("Loading configuration from {}", path.display());
                Self::load_from_str(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "No configuration at {}, using defaults",
                    path.display()
                );
                let mut config = FlingerConfig::default();
                Self::validate_config(&mut config)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            }
            .into()),
        }
    }

    /// Parses and validates a TOML document.
    pub fn load_from_str(content: &str) -> Result<FlingerConfig, CoreError> {
        let mut config: FlingerConfig = toml::from_str(content).map_err(ConfigError::ParseError)?;
        Self::validate_config(&mut config)?;
        Ok(config)
    }

    /// Normalizes case-insensitive string values and range-checks the rest.
    pub fn validate_config(config: &mut FlingerConfig) -> Result<(), ConfigError> {
        config.logging.level = config.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}",
                config.logging.level
            )));
        }

        config.logging.format = config.logging.format.to_lowercase();
        if !LOG_FORMATS.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log format: {}",
                config.logging.format
            )));
        }

        let queue = &config.buffer_queue;
        if !(MIN_BUFFER_COUNT..=MAX_BUFFER_COUNT).contains(&queue.buffer_count) {
            return Err(ConfigError::ValidationError(format!(
                "buffer_count must be within {}..={}, got {}",
                MIN_BUFFER_COUNT, MAX_BUFFER_COUNT, queue.buffer_count
            )));
        }
        if queue.default_width == 0 || queue.default_height == 0 {
            return Err(ConfigError::ValidationError(
                "default buffer dimensions must be non-zero".to_string(),
            ));
        }
        if queue.default_format == 0 {
            return Err(ConfigError::ValidationError(
                "default_format must be a concrete pixel format".to_string(),
            ));
        }

        config.stereo.render_mode = config.stereo.render_mode.to_lowercase();
        if !RENDER_MODES.contains(&config.stereo.render_mode.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid stereo render mode: {}",
                config.stereo.render_mode
            )));
        }

        if config.binder.socket_name.is_empty() || config.binder.socket_name.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "Invalid socket name: {:?}",
                config.binder.socket_name
            )));
        }
        Ok(())
    }
}
