//! XDG base directory and application path resolution, via `directories-next`.
//!
//! Application directories use the qualifier/organization/application triple
//! `org` / `stereoflinger` / `stereoflinger`.

use crate::error::{ConfigError, CoreError};
use directories_next::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "stereoflinger";
const APPLICATION: &str = "stereoflinger";

fn project_dirs() -> Result<ProjectDirs, CoreError> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION).ok_or_else(|| {
        CoreError::Config(ConfigError::DirectoryUnavailable {
            dir_type: "Application Project".to_string(),
        })
    })
}

/// Returns `$XDG_CONFIG_HOME` (e.g. `~/.config`).
pub fn get_config_base_dir() -> Result<PathBuf, CoreError> {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| {
            CoreError::Config(ConfigError::DirectoryUnavailable {
                dir_type: "Config Base".to_string(),
            })
        })
}

/// Returns the application configuration directory, where `config.toml` lives.
pub fn get_app_config_dir() -> Result<PathBuf, CoreError> {
    Ok(project_dirs()?.config_dir().to_path_buf())
}

/// Returns the runtime directory sockets are created in.
///
/// `$XDG_RUNTIME_DIR` is required; there is no fallback.
pub fn get_runtime_dir() -> Result<PathBuf, CoreError> {
    BaseDirs::new()
        .and_then(|dirs| dirs.runtime_dir().map(|p| p.to_path_buf()))
        .ok_or_else(|| {
            CoreError::Config(ConfigError::DirectoryUnavailable {
                dir_type: "Runtime".to_string(),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_dir_is_under_config_base() {
        // Only meaningful where a home directory exists.
        if let (Ok(base), Ok(app)) = (get_config_base_dir(), get_app_config_dir()) {
            assert!(app.starts_with(&base) || cfg!(target_os = "macos"));
            assert!(app.to_string_lossy().contains("stereoflinger"));
        }
    }
}
