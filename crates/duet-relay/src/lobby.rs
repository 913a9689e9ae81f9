//! The lobby owns the player registry and the pair table.
//!
//! It is the single coordinating component: joins, leaves, partner lookups
//! and the hand-off of freshly accepted video connections all go through
//! it. Lock order is always the pair table first, then player slots in
//! ascending identity order.

use std::net::SocketAddr;
use std::sync::Arc;

use duet_common::{Event, EventBus, PlayerId, Result};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::link::LinkState;
use crate::pairing::PairTable;
use crate::registry::{Connection, Registry};
use crate::session::{spawn_session, Endpoint};

/// What a successful join hands back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinTicket {
    pub id: PlayerId,
    pub video_port: u16,
    pub partner: Option<PlayerId>,
}

/// Point-in-time view of one player slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerStatus {
    pub id: PlayerId,
    pub active: bool,
    pub link: LinkState,
    pub partner: Option<PlayerId>,
    pub video_port: u16,
}

#[derive(Clone)]
pub struct Lobby {
    registry: Arc<Registry>,
    pairs: Arc<Mutex<PairTable>>,
    events: Arc<EventBus>,
    buffer_size: usize,
}

impl Lobby {
    pub fn new(registry: Registry, buffer_size: usize) -> Self {
        Self {
            registry: Arc::new(registry),
            pairs: Arc::new(Mutex::new(PairTable::new())),
            events: Arc::new(EventBus::new(256)),
            buffer_size,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Claim a slot and pair it with the first waiting player, if any.
    pub async fn join(&self) -> Result<JoinTicket> {
        let mut pairs = self.pairs.lock().await;
        let player = self.registry.acquire_free_slot().await?;
        let id = player.id();
        info!(player = %id, "Accepted join request");

        let paired = pairs.assign_partner(&self.registry, id).await;
        let partner = pairs.get_partner(id);

        match partner {
            Some(partner) if paired => {
                info!(player = %id, partner = %partner, "Player was assigned a partner");
                self.events.publish(Event::Paired {
                    first: partner,
                    second: id,
                });
            }
            _ => info!(player = %id, "Player was assigned to their own group"),
        }

        // A fast client may already be connected and parked.
        self.try_start_session(&pairs, id).await;
        drop(pairs);

        self.events.publish(Event::PlayerJoined { id });
        Ok(JoinTicket {
            id,
            video_port: player.video_port(),
            partner,
        })
    }

    /// Free a slot. Its connection manager closes any live connection,
    /// which also ends the partner's relay session.
    pub async fn leave(&self, id: PlayerId) -> Result<()> {
        let mut pairs = self.pairs.lock().await;
        self.registry.release(id).await?;
        let former = pairs.detach(id);
        drop(pairs);

        match former {
            Some(partner) => info!(player = %id, partner = %partner, "Player left, partner waits alone"),
            None => info!(player = %id, "Player left"),
        }
        self.events.publish(Event::PlayerLeft { id });
        Ok(())
    }

    pub async fn partner_of(&self, id: PlayerId) -> Option<PlayerId> {
        self.pairs.lock().await.get_partner(id)
    }

    /// Park a freshly accepted video connection for `id` and start a relay
    /// session if the partner is already connected.
    ///
    /// The returned token is cancelled once the connection is finished with.
    pub async fn attach(&self, id: PlayerId, stream: TcpStream, peer: SocketAddr) -> CancellationToken {
        let closed = CancellationToken::new();
        let pairs = self.pairs.lock().await;

        let Some(player) = self.registry.get(id) else {
            closed.cancel();
            return closed;
        };

        {
            let mut state = player.lock().await;
            if !state.active {
                debug!(player = %id, peer = %peer, "Dropping connection for inactive slot");
                closed.cancel();
                return closed;
            }
            state.connection = Some(Connection {
                peer,
                stream: Some(stream),
                closed: closed.clone(),
            });
        }

        self.events.publish(Event::PlayerConnected { id });
        self.try_start_session(&pairs, id).await;
        closed
    }

    /// Drop whatever connection `id` still holds. Called by the connection
    /// manager when it leaves the connected state.
    pub async fn release_connection(&self, id: PlayerId) {
        if let Some(player) = self.registry.get(id) {
            let connection = player.lock().await.connection.take();
            if let Some(connection) = connection {
                connection.closed.cancel();
                debug!(player = %id, peer = %connection.peer, "Released video connection");
            }
        }
    }

    /// Drop `id`'s parked connection if its peer has gone away. Returns
    /// whether it did.
    pub async fn reap_dead_parked(&self, id: PlayerId) -> bool {
        let Some(player) = self.registry.get(id) else {
            return false;
        };
        let mut state = player.lock().await;
        if !state.parked_is_closed() {
            return false;
        }
        if let Some(connection) = state.connection.take() {
            connection.closed.cancel();
            debug!(player = %id, peer = %connection.peer, "Parked connection closed by peer");
        }
        true
    }

    /// Start a relay if `id` and its partner are both active with parked
    /// connections. The caller holds the pair table lock.
    async fn try_start_session(&self, pairs: &PairTable, id: PlayerId) {
        let Some(partner) = pairs.get_partner(id) else {
            return;
        };
        let Some((mut mine, mut theirs)) = self.registry.lock_both(id, partner).await else {
            return;
        };
        if !(mine.active && theirs.active && mine.is_parked() && theirs.is_parked()) {
            return;
        }

        let (Some((source, source_closed)), Some((destination, destination_closed))) =
            (mine.take_parked(), theirs.take_parked())
        else {
            return;
        };
        drop((mine, theirs));

        spawn_session(
            Endpoint {
                player: id,
                stream: source,
                closed: source_closed,
            },
            Endpoint {
                player: partner,
                stream: destination,
                closed: destination_closed,
            },
            self.buffer_size,
            Arc::clone(&self.events),
        );
    }

    /// Status of every slot, in identity order.
    pub async fn snapshot(&self) -> Vec<PlayerStatus> {
        let pairs = self.pairs.lock().await;
        let mut statuses = Vec::with_capacity(self.registry.capacity());
        for player in self.registry.players() {
            let state = player.lock().await;
            statuses.push(PlayerStatus {
                id: player.id(),
                active: state.active,
                link: state.link,
                partner: pairs.get_partner(player.id()),
                video_port: player.video_port(),
            });
        }
        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_common::DuetError;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    async fn socket_pair() -> (TcpStream, TcpStream, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (server, peer) = accepted.unwrap();
        (client.unwrap(), server, peer)
    }

    #[tokio::test]
    async fn two_joins_pair_up() {
        let lobby = Lobby::new(Registry::new(2), 4096);

        let first = lobby.join().await.unwrap();
        assert_eq!(first.id, PlayerId(1));
        assert_eq!(first.partner, None);

        let second = lobby.join().await.unwrap();
        assert_eq!(second.id, PlayerId(2));
        assert_eq!(second.partner, Some(PlayerId(1)));

        assert_eq!(lobby.partner_of(PlayerId(1)).await, Some(PlayerId(2)));
        assert_eq!(lobby.partner_of(PlayerId(2)).await, Some(PlayerId(1)));

        assert!(matches!(lobby.join().await, Err(DuetError::CapacityExceeded)));
    }

    #[tokio::test]
    async fn leave_unknown_player_fails() {
        let lobby = Lobby::new(Registry::new(2), 4096);
        assert!(matches!(
            lobby.leave(PlayerId(1)).await,
            Err(DuetError::UnknownParticipant(PlayerId(1)))
        ));
    }

    #[tokio::test]
    async fn left_partner_is_paired_with_next_joiner() {
        let lobby = Lobby::new(Registry::new(2), 4096);
        lobby.join().await.unwrap();
        lobby.join().await.unwrap();

        lobby.leave(PlayerId(1)).await.unwrap();
        assert_eq!(lobby.partner_of(PlayerId(2)).await, None);

        let again = lobby.join().await.unwrap();
        assert_eq!(again.id, PlayerId(1));
        assert_eq!(again.partner, Some(PlayerId(2)));
        assert_eq!(lobby.partner_of(PlayerId(2)).await, Some(PlayerId(1)));
    }

    #[tokio::test]
    async fn membership_invariant_survives_churn() {
        let lobby = Lobby::new(Registry::new(4), 4096);
        for _ in 0..4 {
            lobby.join().await.unwrap();
        }
        for id in [2, 3] {
            lobby.leave(PlayerId(id)).await.unwrap();
        }
        lobby.join().await.unwrap();
        lobby.leave(PlayerId(1)).await.unwrap();
        lobby.join().await.unwrap();
        lobby.join().await.unwrap();

        let pairs = lobby.pairs.lock().await;
        for id in 1..=4 {
            let count = pairs
                .pairs()
                .iter()
                .filter(|pair| pair.contains(PlayerId(id)))
                .count();
            assert!(count <= 1, "player {id} is in {count} pairs");
        }
        for a in 1..=4 {
            for b in 1..=4 {
                let (a, b) = (PlayerId(a), PlayerId(b));
                assert_eq!(
                    pairs.get_partner(a) == Some(b),
                    pairs.get_partner(b) == Some(a)
                );
            }
        }
    }

    #[tokio::test]
    async fn concurrent_joins_form_consistent_pairs() {
        let lobby = Lobby::new(Registry::new(8), 4096);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lobby = lobby.clone();
            handles.push(tokio::spawn(async move { lobby.join().await.unwrap() }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let pairs = lobby.pairs.lock().await;
        assert_eq!(pairs.pairs().len(), 4);
        assert!(pairs.pairs().iter().all(|pair| pair.second.is_some()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn leave_racing_a_join_never_leaves_a_stale_partner() {
        for _ in 0..100 {
            let lobby = Lobby::new(Registry::new(2), 4096);
            lobby.join().await.unwrap();

            let joining = {
                let lobby = lobby.clone();
                tokio::spawn(async move { lobby.join().await })
            };
            let leaving = {
                let lobby = lobby.clone();
                tokio::spawn(async move { lobby.leave(PlayerId(2)).await })
            };
            let _ = joining.await.unwrap();
            let _ = leaving.await.unwrap();

            let active = lobby.registry().is_active(PlayerId(2)).await;
            let partner = lobby.partner_of(PlayerId(1)).await;
            assert_eq!(partner == Some(PlayerId(2)), active);
        }
    }

    #[tokio::test]
    async fn attached_partners_relay_frames() {
        let lobby = Lobby::new(Registry::new(2), 4096);
        lobby.join().await.unwrap();
        lobby.join().await.unwrap();

        let (mut a, a_server, a_peer) = socket_pair().await;
        let (mut b, b_server, b_peer) = socket_pair().await;

        let a_closed = lobby.attach(PlayerId(1), a_server, a_peer).await;
        assert!(!a_closed.is_cancelled());
        let b_closed = lobby.attach(PlayerId(2), b_server, b_peer).await;

        a.write_all(b"frame-A").await.unwrap();
        let mut buf = [0u8; 7];
        timeout(Duration::from_secs(5), b.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf, b"frame-A");

        drop(a);
        timeout(Duration::from_secs(5), b_closed.cancelled())
            .await
            .unwrap();
        assert!(a_closed.is_cancelled());
    }

    #[tokio::test]
    async fn singleton_connection_stays_parked() {
        let lobby = Lobby::new(Registry::new(2), 4096);
        lobby.join().await.unwrap();

        let (_a, a_server, a_peer) = socket_pair().await;
        let closed = lobby.attach(PlayerId(1), a_server, a_peer).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!closed.is_cancelled());
        let player = lobby.registry().get(PlayerId(1)).unwrap();
        assert!(player.lock().await.is_parked());
    }

    #[tokio::test]
    async fn dead_parked_connection_is_reaped() {
        let lobby = Lobby::new(Registry::new(2), 4096);
        lobby.join().await.unwrap();

        let (a, a_server, a_peer) = socket_pair().await;
        let closed = lobby.attach(PlayerId(1), a_server, a_peer).await;
        assert!(!lobby.reap_dead_parked(PlayerId(1)).await);

        drop(a);
        timeout(Duration::from_secs(5), async {
            while !lobby.reap_dead_parked(PlayerId(1)).await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(closed.is_cancelled());
        let player = lobby.registry().get(PlayerId(1)).unwrap();
        assert!(!player.lock().await.is_parked());
    }

    #[tokio::test]
    async fn attach_to_inactive_slot_is_refused() {
        let lobby = Lobby::new(Registry::new(2), 4096);
        let (_a, a_server, a_peer) = socket_pair().await;
        let closed = lobby.attach(PlayerId(1), a_server, a_peer).await;
        assert!(closed.is_cancelled());
    }

    #[tokio::test]
    async fn leaving_mid_session_releases_partner() {
        let lobby = Lobby::new(Registry::new(2), 4096);
        lobby.join().await.unwrap();
        lobby.join().await.unwrap();

        let (_a, a_server, a_peer) = socket_pair().await;
        let (mut b, b_server, b_peer) = socket_pair().await;
        lobby.attach(PlayerId(1), a_server, a_peer).await;
        let b_closed = lobby.attach(PlayerId(2), b_server, b_peer).await;

        lobby.leave(PlayerId(1)).await.unwrap();
        // The connection manager would do this on deactivation.
        lobby.release_connection(PlayerId(1)).await;

        timeout(Duration::from_secs(5), b_closed.cancelled())
            .await
            .unwrap();
        let mut buf = [0u8; 1];
        let n = timeout(Duration::from_secs(5), b.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn snapshot_lists_every_slot() {
        let lobby = Lobby::new(Registry::with_ports(vec![9000, 9001, 9002]), 4096);
        lobby.join().await.unwrap();
        lobby.join().await.unwrap();

        let snapshot = lobby.snapshot().await;
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].partner, Some(PlayerId(2)));
        assert_eq!(snapshot[1].video_port, 9001);
        assert!(!snapshot[2].active);
        assert_eq!(snapshot[2].link, LinkState::Idle);
    }

    #[tokio::test]
    async fn events_follow_the_lifecycle() {
        let lobby = Lobby::new(Registry::new(2), 4096);
        let mut events = lobby.subscribe();

        lobby.join().await.unwrap();
        lobby.join().await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), Event::PlayerJoined { id } if id == PlayerId(1)));
        assert!(matches!(events.recv().await.unwrap(), Event::Paired { first, second }
            if first == PlayerId(1) && second == PlayerId(2)));
        assert!(matches!(events.recv().await.unwrap(), Event::PlayerJoined { id } if id == PlayerId(2)));
    }
}
