use std::net::SocketAddr;
use std::path::PathBuf;

use crate::id::PlayerId;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),

    #[error("no config directory on this platform")]
    NoConfigDir,

    #[error("config io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DuetError {
    #[error("maximum amount of players reached")]
    CapacityExceeded,

    #[error("no active player with id {0}")]
    UnknownParticipant(PlayerId),

    #[error("accept failed: {0}")]
    AcceptFailure(#[source] std::io::Error),

    #[error("relay io error: {0}")]
    RelayIo(#[source] std::io::Error),

    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DuetError {
    /// Whether the error ends the process. Only startup configuration
    /// failures do; everything else is handled by the owning task.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DuetError::Configuration(_))
    }
}
