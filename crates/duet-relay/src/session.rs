//! Relay sessions: one running relay between two paired, connected players.

use std::sync::Arc;

use duet_common::{Event, EventBus, PlayerId, SessionId};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::relay::{relay, RelayEnd};

/// One side of a session: the player, its stream, and the token its
/// connection manager waits on.
pub struct Endpoint {
    pub player: PlayerId,
    pub stream: TcpStream,
    pub closed: CancellationToken,
}

/// Spawn a relay between `source` and `destination`.
///
/// The session stops when either side's `closed` token is cancelled (the
/// player left) or when the relay itself ends. Afterwards both tokens are
/// cancelled so each connection manager goes back to listening.
pub fn spawn_session(
    source: Endpoint,
    destination: Endpoint,
    buffer_size: usize,
    events: Arc<EventBus>,
) -> SessionId {
    let session = SessionId::new();
    let id = session.clone();

    tokio::spawn(async move {
        let Endpoint {
            player: first,
            stream: source,
            closed: source_closed,
        } = source;
        let Endpoint {
            player: second,
            stream: destination,
            closed: destination_closed,
        } = destination;

        info!(session = %id, first = %first, second = %second, "Relay session started");
        events.publish(Event::SessionStarted {
            session: id.clone(),
            first,
            second,
        });

        let cancel = CancellationToken::new();
        let running = relay(source, destination, cancel.clone(), buffer_size);
        tokio::pin!(running);

        let report = tokio::select! {
            report = &mut running => report,
            _ = source_closed.cancelled() => {
                cancel.cancel();
                running.await
            }
            _ = destination_closed.cancelled() => {
                cancel.cancel();
                running.await
            }
        };

        match &report.end {
            RelayEnd::Failed(e) => {
                warn!(session = %id, error = %e, "Relay session failed");
            }
            end => {
                info!(
                    session = %id,
                    end = ?end,
                    forward = report.forward,
                    backward = report.backward,
                    "Relay session ended"
                );
            }
        }

        source_closed.cancel();
        destination_closed.cancel();
        events.publish(Event::SessionEnded {
            session: id,
            first,
            second,
        });
    });

    session
}
