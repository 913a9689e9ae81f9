//! Per-player connection state machine.
//!
//! ```text
//! Idle --Activated--> Listening --Accepted--> Connected
//!  ^                     |  ^                    |
//!  +----Deactivated------+  +---Disconnected-----+
//!  ^                                             |
//!  +----------------Deactivated------------------+
//! ```

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Slot is free; nothing is accepted.
    Idle,
    /// Waiting for the player's video connection.
    Listening,
    /// A video connection is open, relaying or waiting for the partner.
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The slot was claimed by a join.
    Activated,
    /// A video connection was accepted.
    Accepted,
    /// The connection or its relay session ended.
    Disconnected,
    /// The player left.
    Deactivated,
}

impl LinkState {
    /// Apply `event`, or `None` when the transition is not allowed.
    pub fn next(self, event: LinkEvent) -> Option<LinkState> {
        use LinkEvent::*;
        use LinkState::*;

        match (self, event) {
            (Idle, Activated) => Some(Listening),
            (Listening, Accepted) => Some(Connected),
            (Listening, Deactivated) => Some(Idle),
            (Connected, Disconnected) => Some(Listening),
            (Connected, Deactivated) => Some(Idle),
            _ => None,
        }
    }
}
