use serde::Serialize;
use tokio::sync::broadcast;

use crate::id::{PlayerId, SessionId};

/// Lobby lifecycle notifications, pushed to control clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    PlayerJoined { id: PlayerId },
    PlayerLeft { id: PlayerId },
    Paired { first: PlayerId, second: PlayerId },
    PlayerConnected { id: PlayerId },
    SessionStarted { session: SessionId, first: PlayerId, second: PlayerId },
    SessionEnded { session: SessionId, first: PlayerId, second: PlayerId },
}

pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}
