//! Duet configuration system.
//!
//! TOML-based configuration with validation. Every section uses serde
//! defaults, so an empty or partial file is a valid config.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use duet_config::load_config;
//!
//! let config = load_config(None).expect("failed to load config");
//! println!("control port {}", config.control.port);
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    ControlConfig, DuetConfig, LogLevel, LoggingConfig, PoolConfig, VideoConfig,
    CONFIG_SCHEMA_VERSION,
};

use duet_common::ConfigError;
use std::path::Path;

/// Load config from `path`, or from the platform default location when
/// `path` is `None`. The result is always validated.
pub fn load_config(path: Option<&Path>) -> Result<DuetConfig, ConfigError> {
    match path {
        Some(path) => toml_loader::load_from_path(path),
        None => toml_loader::load_default(),
    }
}
