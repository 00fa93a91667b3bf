//! Configuration data structures.
//!
//! These structs are populated by deserializing `config.toml`. Missing fields
//! take their values from [`super::defaults`]; unknown fields are rejected via
//! `#[serde(deny_unknown_fields)]`.

use super::defaults;
use serde::Deserialize;
use std::path::PathBuf;

/// Configuration settings for the logging subsystem.
///
/// ```
/// use flinger_core::config::LoggingConfig;
///
/// let log_config: LoggingConfig = toml::from_str(r#"
/// level = "debug"
/// format = "json"
/// "#).unwrap();
/// assert_eq!(log_config.level, "debug");
/// assert_eq!(log_config.file_path, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Minimum level: "trace", "debug", "info", "warn" or "error".
    #[serde(default = "defaults::default_log_level")]
    pub level: String,
    /// Optional log file. `None` disables file logging.
    #[serde(default = "defaults::default_log_file_path")]
    pub file_path: Option<PathBuf>,
    /// "text" or "json".
    #[serde(default = "defaults::default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        defaults::default_logging_config()
    }
}

/// Consumer-side defaults applied to every new buffer queue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BufferQueueConfig {
    /// Width used when a producer dequeues with `w == 0`.
    #[serde(default = "defaults::default_buffer_width")]
    pub default_width: u32,
    /// Height used when a producer dequeues with `h == 0`.
    #[serde(default = "defaults::default_buffer_height")]
    pub default_height: u32,
    /// Pixel format used when a producer dequeues with `format == 0`.
    #[serde(default = "defaults::default_buffer_format")]
    pub default_format: u32,
    /// Slot count restored by `setBufferCount(0)`.
    #[serde(default = "defaults::default_buffer_count")]
    pub buffer_count: usize,
    /// Whether new queues start in synchronous mode.
    #[serde(default)]
    pub synchronous: bool,
    /// Transform hint reported to producers.
    #[serde(default)]
    pub transform_hint: u32,
}

impl Default for BufferQueueConfig {
    fn default() -> Self {
        defaults::default_buffer_queue_config()
    }
}

/// Compositor stereo output settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StereoConfig {
    /// One of "default", "frame-packing", "anaglyph", "interleaved", "mono".
    #[serde(default = "defaults::default_render_mode")]
    pub render_mode: String,
}

impl Default for StereoConfig {
    fn default() -> Self {
        Self {
            render_mode: defaults::default_render_mode(),
        }
    }
}

/// Where the producer-facing socket lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BinderConfig {
    /// Socket file name inside the runtime directory.
    #[serde(default = "defaults::default_socket_name")]
    pub socket_name: String,
    /// Overrides `$XDG_RUNTIME_DIR` when set.
    #[serde(default)]
    pub runtime_dir: Option<PathBuf>,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            socket_name: defaults::default_socket_name(),
            runtime_dir: None,
        }
    }
}

/// Root configuration structure.
///
/// ```
/// use flinger_core::config::FlingerConfig;
///
/// let config: FlingerConfig = toml::from_str(r#"
/// [buffer_queue]
/// buffer_count = 4
///
/// [stereo]
/// render_mode = "anaglyph"
/// "#).unwrap();
/// assert_eq!(config.buffer_queue.buffer_count, 4);
/// assert_eq!(config.stereo.render_mode, "anaglyph");
/// assert_eq!(config.logging.level, "info");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlingerConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub buffer_queue: BufferQueueConfig,
    #[serde(default)]
    pub stereo: StereoConfig,
    #[serde(default)]
    pub binder: BinderConfig,
}
