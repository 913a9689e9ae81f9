//! Control-channel wire protocol. One JSON object per WebSocket text frame.

use duet_common::{Event, PlayerId};
use serde::{Deserialize, Serialize};

use crate::lobby::PlayerStatus;

/// Requests a control client may send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    Join,
    Leave { id: PlayerId },
    Partner { id: PlayerId },
    Status,
}

/// Messages the server sends back, plus pushed lobby events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
    Joined {
        id: PlayerId,
        video_port: u16,
        partner: Option<PlayerId>,
    },
    Left {
        id: PlayerId,
    },
    Partner {
        id: PlayerId,
        partner: Option<PlayerId>,
    },
    Status {
        players: Vec<PlayerStatus>,
    },
    Event {
        event: Event,
    },
    Error {
        message: String,
    },
}

impl ControlResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
