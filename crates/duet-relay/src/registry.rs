//! Fixed pool of player slots.
//!
//! Slots are created once at startup and recycled: a join marks the first
//! inactive slot active, a leave marks it inactive again. Every slot carries
//! its own lock; callers that need two slots at once go through
//! [`Registry::lock_both`], which always locks the lower identity first.

use std::io;
use std::mem::MaybeUninit;
use std::net::SocketAddr;
use std::sync::Arc;

use duet_common::{DuetError, PlayerId, Result};
use socket2::SockRef;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::link::LinkState;

/// A live video connection held by a player slot.
///
/// `stream` is `Some` while the connection is parked waiting for a partner
/// and `None` once a relay session has taken it.
pub struct Connection {
    pub peer: SocketAddr,
    pub stream: Option<TcpStream>,
    /// Cancelled when the connection is finished with, for any reason.
    pub closed: CancellationToken,
}

/// Mutable per-slot state, guarded by the slot's lock.
pub struct PlayerState {
    pub active: bool,
    /// Bumped on every activation so a stale connection can tell that its
    /// slot was recycled.
    pub generation: u64,
    pub link: LinkState,
    pub connection: Option<Connection>,
}

impl PlayerState {
    /// Whether a connected stream is waiting for a relay session.
    pub fn is_parked(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.stream.is_some() && !c.closed.is_cancelled())
    }

    /// Whether the parked stream's peer has closed it or the socket failed.
    /// Peeks without consuming, so early bytes stay queued for the relay.
    pub fn parked_is_closed(&self) -> bool {
        let Some(stream) = self.connection.as_ref().and_then(|c| c.stream.as_ref()) else {
            return false;
        };
        let mut probe = [MaybeUninit::<u8>::uninit(); 1];
        match SockRef::from(stream).peek(&mut probe) {
            Ok(0) => true,
            Ok(_) => false,
            Err(e) => e.kind() != io::ErrorKind::WouldBlock,
        }
    }

    /// Take the parked stream out for a relay session.
    pub fn take_parked(&mut self) -> Option<(TcpStream, CancellationToken)> {
        let conn = self.connection.as_mut()?;
        let stream = conn.stream.take()?;
        Some((stream, conn.closed.clone()))
    }
}

pub struct Player {
    id: PlayerId,
    video_port: u16,
    state: Mutex<PlayerState>,
    /// `Some(generation)` while active, `None` while idle.
    activation: watch::Sender<Option<u64>>,
}

impl Player {
    fn new(id: PlayerId, video_port: u16) -> Self {
        let (activation, _) = watch::channel(None);
        Self {
            id,
            video_port,
            state: Mutex::new(PlayerState {
                active: false,
                generation: 0,
                link: LinkState::Idle,
                connection: None,
            }),
            activation,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn video_port(&self) -> u16 {
        self.video_port
    }

    pub async fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().await
    }

    /// Watch activation changes for this slot.
    pub fn subscribe(&self) -> watch::Receiver<Option<u64>> {
        self.activation.subscribe()
    }
}

/// Thread-safe pool of player slots.
pub struct Registry {
    players: Vec<Arc<Player>>,
}

impl Registry {
    /// A pool of `capacity` slots without bound video endpoints.
    pub fn new(capacity: u32) -> Self {
        Self::with_ports(vec![0; capacity as usize])
    }

    /// One slot per port; slot `N` (numbered from 1) streams on `ports[N - 1]`.
    pub fn with_ports(ports: Vec<u16>) -> Self {
        let players = ports
            .into_iter()
            .zip(1u32..)
            .map(|(port, id)| Arc::new(Player::new(PlayerId(id), port)))
            .collect();
        Self { players }
    }

    pub fn capacity(&self) -> usize {
        self.players.len()
    }

    pub fn get(&self, id: PlayerId) -> Option<&Arc<Player>> {
        let index = id.0.checked_sub(1)? as usize;
        self.players.get(index)
    }

    pub fn players(&self) -> impl Iterator<Item = &Arc<Player>> {
        self.players.iter()
    }

    /// Claim the first inactive slot.
    pub async fn acquire_free_slot(&self) -> Result<Arc<Player>> {
        for player in &self.players {
            let mut state = player.lock().await;
            if !state.active {
                state.active = true;
                state.generation += 1;
                player.activation.send_replace(Some(state.generation));
                return Ok(Arc::clone(player));
            }
        }
        Err(DuetError::CapacityExceeded)
    }

    /// Mark an active slot inactive again.
    pub async fn release(&self, id: PlayerId) -> Result<()> {
        let player = self.get(id).ok_or(DuetError::UnknownParticipant(id))?;
        let mut state = player.lock().await;
        if !state.active {
            return Err(DuetError::UnknownParticipant(id));
        }
        state.active = false;
        player.activation.send_replace(None);
        Ok(())
    }

    pub async fn is_active(&self, id: PlayerId) -> bool {
        match self.get(id) {
            Some(player) => player.lock().await.active,
            None => false,
        }
    }

    /// Lock two distinct slots in ascending identity order. The guards are
    /// returned in argument order.
    pub async fn lock_both(
        &self,
        a: PlayerId,
        b: PlayerId,
    ) -> Option<(MutexGuard<'_, PlayerState>, MutexGuard<'_, PlayerState>)> {
        if a == b {
            return None;
        }
        let pa = self.get(a)?;
        let pb = self.get(b)?;
        if a < b {
            let ga = pa.lock().await;
            let gb = pb.lock().await;
            Some((ga, gb))
        } else {
            let gb = pb.lock().await;
            let ga = pa.lock().await;
            Some((ga, gb))
        }
    }
}
