//! Core TOML config loading: read from path or platform default.

use crate::schema::DuetConfig;
use crate::validation;
use duet_common::ConfigError;
use std::path::Path;
use tracing::info;

use super::paths::{create_default_config, default_config_path, io_error};

/// Load config from a specific TOML file path.
///
/// Missing fields take their serde defaults. An invalid config is an
/// error: the server refuses to start on out-of-range values.
pub fn load_from_path(path: &Path) -> Result<DuetConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(io_error(path))?;

    let config: DuetConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    validation::validate(&config)?;

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// On macOS: `~/Library/Application Support/duet/config.toml`
/// On Linux: `~/.config/duet/config.toml`
///
/// If the file does not exist, creates a default config file and returns defaults.
pub fn load_default() -> Result<DuetConfig, ConfigError> {
    let path = default_config_path()?;

    match load_from_path(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) => {
            info!("no config found at {}, creating default", path.display());
            create_default_config(&path)?;
            Ok(DuetConfig::default())
        }
        Err(e) => Err(e),
    }
}
