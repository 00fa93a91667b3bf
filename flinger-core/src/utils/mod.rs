//! Filesystem and path helpers shared by the ambient services.
//!
//! - [`fs`]: directory creation with path-annotated errors.
//! - [`paths`]: XDG base directory and runtime directory resolution.

pub mod fs;
pub mod paths;

pub use fs::ensure_dir_exists;
