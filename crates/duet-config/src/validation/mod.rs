//! Full configuration validation.
//!
//! Validates numeric ranges and bind addresses. Each domain has its own
//! submodule; this orchestrator calls them all and collects errors into a
//! single `ConfigError`.

mod helpers;
mod network;
mod system;


use crate::schema::DuetConfig;
use duet_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &DuetConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    network::validate_control(&mut errors, config);
    network::validate_video(&mut errors, config);
    system::validate_pool(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
