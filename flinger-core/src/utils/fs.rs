//! Filesystem utilities.

use crate::error::CoreError;
use std::fs;
use std::path::Path;

/// Creates `path` (and its parents) unless it already exists as a directory.
///
/// # Errors
///
/// Returns [`CoreError::Filesystem`] if `path` exists but is not a directory,
/// or if creating it fails.
pub fn ensure_dir_exists(path: &Path) -> Result<(), CoreError> {
    if path.exists() {
        if !path.is_dir() {
            Err(CoreError::Filesystem {
                message: "Path exists but is not a directory".to_string(),
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "Path exists but is not a directory",
                ),
            })
        } else {
            Ok(())
        }
    } else {
        fs::create_dir_all(path).map_err(|e| CoreError::Filesystem {
            message: "Failed to create directory".to_string(),
            path: path.to_path_buf(),
            source: e,
        })
    }
}
