//! Where the config file lives, and writing the first one.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use duet_common::ConfigError;
use tracing::info;

use super::template::default_config_toml;

/// `<platform config dir>/duet/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("duet").join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Write the commented default template to `path`, creating parent
/// directories as needed.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    fs::write(path, default_config_toml()).map_err(io_error(path))?;

    info!(path = %path.display(), "Wrote default config");
    Ok(())
}

/// Map a filesystem failure on `path` to a config error.
pub(crate) fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ConfigError {
    let path = path.to_path_buf();
    move |source| ConfigError::Io { path, source }
}
