//! System configuration types: player pool and logging.

use serde::{Deserialize, Serialize};

/// Player pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of player slots (valid range: 2-64).
    pub capacity: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { capacity: 2 }
    }
}

/// Log level. Accepted case-insensitively on the command line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[derive(Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "WARN")]
    #[value(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    /// `tracing` filter directive for the duet crates at this level.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "duet=trace",
            LogLevel::Debug => "duet=debug",
            LogLevel::Info => "duet=info",
            LogLevel::Warning => "duet=warn",
            LogLevel::Error => "duet=error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}
