//! Configuration schema types for Duet.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod network;
mod system;

pub use network::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Duet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct DuetConfig {
    pub control: ControlConfig,
    pub video: VideoConfig,
    pub pool: PoolConfig,
    pub logging: LoggingConfig,
}
