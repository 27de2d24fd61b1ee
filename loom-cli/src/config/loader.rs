use super::types::LoomCliConfig;
use anyhow::Result;
use std::path::PathBuf;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the CLI config from the user's config file, falling back to
    /// defaults when it does not exist.
    pub fn load() -> Result<LoomCliConfig> {
        Self::load_from_path(&Self::config_path())
    }

    /// Path to the config file under the XDG config directory.
    pub fn config_path() -> PathBuf {
        loom_paths::config_dir().join("config.toml")
    }

    /// Load config from a specific path, used directly by tests and
    /// indirectly by [`Self::load`].
    pub fn load_from_path(path: &std::path::Path) -> Result<LoomCliConfig> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            Ok(LoomCliConfig::default())
        }
    }
}
