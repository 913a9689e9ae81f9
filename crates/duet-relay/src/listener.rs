//! Connection manager: one task per player slot driving the link state
//! machine over that slot's own video listener.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use duet_common::{ConfigError, DuetError, PlayerId};
use duet_config::VideoConfig;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::link::{LinkEvent, LinkState};
use crate::lobby::Lobby;
use crate::registry::Player;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Transport settings applied to every video connection.
#[derive(Debug, Clone, Copy)]
pub struct LinkSettings {
    pub keepalive: Duration,
    /// Deadline for a single accept attempt, renewed on every attempt.
    pub accept_timeout: Option<Duration>,
    pub buffer_size: usize,
}

impl LinkSettings {
    pub fn from_config(video: &VideoConfig) -> Self {
        Self {
            keepalive: Duration::from_secs(u64::from(video.keepalive_secs)),
            accept_timeout: match video.accept_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(u64::from(secs))),
            },
            buffer_size: video.buffer_size as usize,
        }
    }
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self::from_config(&VideoConfig::default())
    }
}

/// Bind one video listener per slot. Slot `N` gets `base_port + N - 1`, or
/// an ephemeral port when `base_port` is zero.
pub async fn bind_video_listeners(
    video: &VideoConfig,
    capacity: u32,
) -> Result<Vec<TcpListener>, ConfigError> {
    let ip: IpAddr = video
        .bind
        .parse()
        .map_err(|e| ConfigError::ValidationError(format!("video.bind: {e}")))?;
    let mut listeners = Vec::with_capacity(capacity as usize);
    for index in 0..capacity {
        let port = match video.base_port {
            0 => 0,
            base => u16::try_from(u32::from(base) + index).map_err(|_| {
                ConfigError::ValidationError(format!(
                    "video.base_port = {base} leaves no room for {capacity} players"
                ))
            })?,
        };
        let addr = SocketAddr::new(ip, port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ConfigError::Bind { addr, source })?;
        listeners.push(listener);
    }
    Ok(listeners)
}

/// Enable keep-alive probing and disable Nagle on an accepted stream.
fn configure_stream(stream: &TcpStream, keepalive: Duration) -> std::io::Result<()> {
    stream.set_nodelay(true)?;
    let params = TcpKeepalive::new()
        .with_time(keepalive)
        .with_interval(keepalive);
    SockRef::from(stream).set_tcp_keepalive(&params)
}

/// Drives one slot: Idle → Listening → Connected → Listening ... forever.
pub struct SlotListener {
    player: Arc<Player>,
    listener: TcpListener,
    lobby: Lobby,
    settings: LinkSettings,
}

impl SlotListener {
    pub fn new(player: Arc<Player>, listener: TcpListener, lobby: Lobby, settings: LinkSettings) -> Self {
        Self {
            player,
            listener,
            lobby,
            settings,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.player.id()
    }

    /// Run the state machine for as long as the slot exists.
    pub async fn run(self) {
        let id = self.id();
        let mut activation = self.player.subscribe();
        let mut state = LinkState::Idle;
        let mut generation = 0u64;
        let mut closed: Option<CancellationToken> = None;

        loop {
            let event = match state {
                // Connections that reach an idle slot belong to nobody; drop
                // them so the next player never inherits a stale one.
                LinkState::Idle => loop {
                    tokio::select! {
                        biased;
                        activated = wait_activated(&mut activation) => match activated {
                            Some(g) => {
                                generation = g;
                                break LinkEvent::Activated;
                            }
                            None => return,
                        },
                        accepted = self.listener.accept() => match accepted {
                            Ok((_, peer)) => {
                                debug!(player = %id, peer = %peer, "Dropped connection to idle slot");
                            }
                            Err(e) => {
                                debug!(player = %id, error = %e, "Accept failed on idle slot");
                                tokio::time::sleep(ACCEPT_BACKOFF).await;
                            }
                        },
                    }
                },
                LinkState::Listening => {
                    tokio::select! {
                        _ = wait_deactivated(&mut activation, generation) => LinkEvent::Deactivated,
                        (stream, peer) = self.accept() => {
                            info!(player = %id, peer = %peer, "Connected to player");
                            if let Err(e) = configure_stream(&stream, self.settings.keepalive) {
                                warn!(player = %id, error = %e, "Failed to enable keep-alive");
                            }
                            closed = Some(self.lobby.attach(id, stream, peer).await);
                            LinkEvent::Accepted
                        }
                    }
                }
                LinkState::Connected => {
                    let token = closed.take().unwrap_or_else(CancellationToken::new);
                    let mut probe = tokio::time::interval(self.settings.keepalive);
                    probe.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    let event = loop {
                        tokio::select! {
                            _ = token.cancelled() => break LinkEvent::Disconnected,
                            _ = wait_deactivated(&mut activation, generation) => {
                                token.cancel();
                                break LinkEvent::Deactivated;
                            }
                            // A parked connection has no relay to notice its peer leaving.
                            _ = probe.tick() => {
                                if self.lobby.reap_dead_parked(id).await {
                                    break LinkEvent::Disconnected;
                                }
                            }
                        }
                    };
                    self.lobby.release_connection(id).await;
                    info!(player = %id, "Lost connection to player");
                    event
                }
            };

            state = self.transition(state, event).await;
        }
    }

    async fn transition(&self, from: LinkState, event: LinkEvent) -> LinkState {
        let id = self.id();
        match from.next(event) {
            Some(next) => {
                self.player.lock().await.link = next;
                debug!(player = %id, from = ?from, to = ?next, "Link transition");
                if next == LinkState::Listening {
                    info!(player = %id, "Started listening for a connection");
                }
                next
            }
            None => {
                warn!(player = %id, state = ?from, event = ?event, "Ignoring invalid link event");
                from
            }
        }
    }

    /// Accept the next connection, retrying on failure and on an elapsed
    /// per-attempt deadline.
    async fn accept(&self) -> (TcpStream, SocketAddr) {
        let id = self.id();
        loop {
            let attempt = self.listener.accept();
            let result = match self.settings.accept_timeout {
                Some(deadline) => match tokio::time::timeout(deadline, attempt).await {
                    Ok(result) => result,
                    Err(_) => {
                        debug!(player = %id, "Accept deadline elapsed, still listening");
                        continue;
                    }
                },
                None => attempt.await,
            };

            match result {
                Ok(accepted) => return accepted,
                Err(e) => {
                    let err = DuetError::AcceptFailure(e);
                    warn!(player = %id, error = %err, "Socket error while accepting");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

/// Wait until the slot is claimed; `None` once the slot is dropped.
async fn wait_activated(activation: &mut watch::Receiver<Option<u64>>) -> Option<u64> {
    let value = activation.wait_for(Option::is_some).await.ok()?;
    *value
}

/// Wait until activation `generation` is over: the slot was released, or
/// released and claimed again.
async fn wait_deactivated(activation: &mut watch::Receiver<Option<u64>>, generation: u64) {
    if activation
        .wait_for(|current| *current != Some(generation))
        .await
        .is_err()
    {
        std::future::pending::<()>().await;
    }
}
