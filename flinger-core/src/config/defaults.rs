//! Default configuration values.
//!
//! Referenced from the `#[serde(default = "...")]` attributes in
//! [`super::types`].

use super::types::{BufferQueueConfig, LoggingConfig};
use std::path::PathBuf;

/// Valid values for [`LoggingConfig::level`].
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for [`LoggingConfig::format`].
pub const LOG_FORMATS: &[&str] = &["text", "json"];

/// Valid values for `StereoConfig::render_mode`.
pub const RENDER_MODES: &[&str] = &["default", "frame-packing", "anaglyph", "interleaved", "mono"];

/// Smallest slot count a queue may be configured with.
pub const MIN_BUFFER_COUNT: usize = 2;

/// Size of the slot table.
pub const MAX_BUFFER_COUNT: usize = 32;

pub(super) fn default_logging_config() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        file_path: default_log_file_path(),
        format: default_log_format(),
    }
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

pub(super) fn default_log_file_path() -> Option<PathBuf> {
    None
}

pub(super) fn default_log_format() -> String {
    "text".to_string()
}

pub(super) fn default_buffer_queue_config() -> BufferQueueConfig {
    BufferQueueConfig {
        default_width: default_buffer_width(),
        default_height: default_buffer_height(),
        default_format: default_buffer_format(),
        buffer_count: default_buffer_count(),
        synchronous: false,
        transform_hint: 0,
    }
}

pub(super) fn default_buffer_width() -> u32 {
    1
}

pub(super) fn default_buffer_height() -> u32 {
    1
}

/// RGBA_8888.
pub(super) fn default_buffer_format() -> u32 {
    1
}

pub(super) fn default_buffer_count() -> usize {
    3
}

pub(super) fn default_render_mode() -> String {
    "default".to_string()
}

pub(super) fn default_socket_name() -> String {
    "surface-texture-0".to_string()
}
