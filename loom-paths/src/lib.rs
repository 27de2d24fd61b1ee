//! XDG Base Directory paths for loom.
//!
//! CLI tools should use XDG paths for cross-platform consistency,
//! not platform-native paths. This matches tools like gh, docker, kubectl.

use std::path::PathBuf;

/// Get the loom config directory.
///
/// Returns `$XDG_CONFIG_HOME/loom` if set, otherwise `~/.config/loom`.
///
/// # Examples
///
/// ```
/// use loom_paths::config_dir;
///
/// let config = config_dir();
/// let db = config.join("sessions.db");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join("loom")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config/loom")
    } else {
        PathBuf::from(".config/loom")
    }
}

/// Get the loom data directory.
///
/// Returns `$XDG_DATA_HOME/loom` if set, otherwise `~/.local/share/loom`.
/// This is where durable event log storage lives.
///
/// # Examples
///
/// ```
/// use loom_paths::data_dir;
///
/// let data = data_dir();
/// let log_dir = data.join("events");
/// ```
pub fn data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join("loom")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".local/share/loom")
    } else {
        PathBuf::from(".local/share/loom")
    }
}
