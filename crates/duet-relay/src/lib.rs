//! duet-relay: pairing lobby and TCP video relay for two-player sessions.
//!
//! Players join through a WebSocket control endpoint, get a slot id and a
//! dedicated video port, and are paired first-come first-served. Once both
//! members of a pair are connected on their video ports, every byte one
//! sends is relayed unchanged to the other.

pub mod connection;
pub mod link;
pub mod listener;
pub mod lobby;
pub mod pairing;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;

pub use lobby::{JoinTicket, Lobby, PlayerStatus};
pub use protocol::{ControlRequest, ControlResponse};
pub use server::Server;
