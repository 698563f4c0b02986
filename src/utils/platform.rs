//! Platform-specific directory resolution
//!
//! haul keeps two distinct filesystem roots: the engines' working directory, where payloads are
//! written while downloading, and the library root, where finished payloads are filed. Both
//! default to paths under the current directory; the settings file lives in the platform
//! configuration directory.

use std::path::PathBuf;
use tracing::warn;

/// Returns the configuration directory
/// - macOS: ~/Library/Application Support/haul
/// - Windows: %APPDATA%\haul
/// - Linux: ~/.config/haul
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| {
            warn!("Could not determine configuration directory, using current directory");
            PathBuf::from(".")
        })
        .join("haul")
}

/// Default location of the settings file
pub fn default_settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Default engine working directory: `./downloads`
pub fn default_working_dir() -> PathBuf {
    PathBuf::from("downloads")
}

/// Default library root, a sibling of the working directory: `./files`
pub fn default_library_dir() -> PathBuf {
    PathBuf::from("files")
}
