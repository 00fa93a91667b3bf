//! Error handling for the stereoflinger core layer.
//!
//! The main error type for this crate is [`CoreError`], which wraps the more
//! specific [`ConfigError`]. Both are defined with `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type shared by the ambient services (configuration, logging,
/// filesystem helpers).
#[derive(Debug, Error)]
pub enum CoreError {
    /// Errors related to configuration loading, parsing, or validation.
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),

    /// The global `tracing` subscriber could not be installed.
    #[error("Logging Initialization Failed: {0}")]
    LoggingInitialization(String),

    /// Filesystem errors tied to a concrete path.
    #[error("Filesystem Error: {message} (Path: {path:?})")]
    Filesystem {
        message: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// General I/O errors not covered by other variants.
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input provided to a function or method.
    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    /// Catch-all for unexpected internal errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Error type for configuration-related operations.
///
/// Typically wrapped by [`CoreError::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("Failed to read configuration file from {path:?}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or does not match the schema.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Values parsed successfully but are not acceptable.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// A required base directory (e.g. XDG config home) could not be determined.
    #[error("Could not determine base directory for {dir_type}")]
    DirectoryUnavailable { dir_type: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_core_error_config_variant() {
        let core_err = CoreError::Config(ConfigError::ValidationError("bad count".to_string()));
        assert_eq!(
            format!("{}", core_err),
            "Configuration Error: Configuration validation failed: bad count"
        );
        match core_err.source().and_then(|s| s.downcast_ref::<ConfigError>()) {
            Some(ConfigError::ValidationError(msg)) => assert_eq!(msg, "bad count"),
            other => panic!("Incorrect source for CoreError::Config: {:?}", other),
        }
    }

    #[test]
    fn test_core_error_filesystem_variant() {
        let path = PathBuf::from("/tmp/flinger.log");
        let core_err = CoreError::Filesystem {
            message: "create failed".to_string(),
            path: path.clone(),
            source: IoError::new(ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            format!("{}", core_err),
            format!("Filesystem Error: create failed (Path: {:?})", path)
        );
        assert_eq!(
            core_err.source().unwrap().downcast_ref::<IoError>().unwrap().kind(),
            ErrorKind::PermissionDenied
        );
    }

    #[test]
    fn test_core_error_io_from() {
        let core_err: CoreError = IoError::new(ErrorKind::NotFound, "gone").into();
        assert_eq!(format!("{}", core_err), "I/O Error: gone");
    }

    #[test]
    fn test_config_error_parse_from_toml() {
        let toml_err = toml::from_str::<toml::Value>("= nope").unwrap_err();
        let config_err: ConfigError = toml_err.into();
        assert!(format!("{}", config_err).starts_with("Failed to parse configuration file"));
    }

    #[test]
    fn test_config_error_directory_unavailable() {
        let err = ConfigError::DirectoryUnavailable { dir_type: "Config Base".to_string() };
        assert_eq!(format!("{}", err), "Could not determine base directory for Config Base");
    }
}
