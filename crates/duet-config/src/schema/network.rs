//! Network configuration: the control endpoint and per-player video ports.

use serde::{Deserialize, Serialize};

/// Control endpoint that clients use to join and leave.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

/// Video stream listeners, one per player slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub bind: String,
    /// Player N listens on `base_port + N - 1`. Zero picks ephemeral ports.
    pub base_port: u16,
    /// Keep-alive idle time and probe interval in seconds (valid range: 1-60).
    pub keepalive_secs: u32,
    /// Deadline for each accept attempt in seconds. Zero disables it.
    pub accept_timeout_secs: u32,
    /// Read buffer per relay direction in bytes (valid range: 1024-1048576).
    pub buffer_size: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            base_port: 8000,
            keepalive_secs: 1,
            accept_timeout_secs: 0,
            buffer_size: 64 * 1024,
        }
    }
}
