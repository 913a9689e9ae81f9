//! Control connections: JSON requests in, responses and lobby events out.

use std::net::SocketAddr;

use duet_common::DuetError;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use crate::lobby::Lobby;
use crate::protocol::{ControlRequest, ControlResponse};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Accept control clients until the listener fails permanently.
pub async fn serve(listener: TcpListener, lobby: Lobby) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let lobby = lobby.clone();
                tokio::spawn(async move {
                    match accept_async(stream).await {
                        Ok(ws) => handle_connection(ws, addr, lobby).await,
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Control accept error");
            }
        }
    }
}

/// Handle a single control WebSocket.
pub async fn handle_connection(ws: WebSocketStream<TcpStream>, addr: SocketAddr, lobby: Lobby) {
    let (mut sink, mut stream) = ws.split();
    let mut events = lobby.subscribe();
    tracing::debug!(peer = %addr, "Control client connected");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if send_response(&mut sink, &ControlResponse::Event { event }).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(peer = %addr, skipped, "Control client lagging behind events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let response = match serde_json::from_str::<ControlRequest>(&text) {
                            Ok(request) => handle_request(&lobby, request).await,
                            Err(e) => {
                                tracing::debug!(peer = %addr, error = %e, "Invalid control request");
                                ControlResponse::error(format!("invalid request: {e}"))
                            }
                        };
                        if send_response(&mut sink, &response).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    tracing::debug!(peer = %addr, "Control client disconnected");
}

/// Run one request against the lobby.
pub async fn handle_request(lobby: &Lobby, request: ControlRequest) -> ControlResponse {
    match request {
        ControlRequest::Join => match lobby.join().await {
            Ok(ticket) => ControlResponse::Joined {
                id: ticket.id,
                video_port: ticket.video_port,
                partner: ticket.partner,
            },
            Err(e) => failure(e),
        },
        ControlRequest::Leave { id } => match lobby.leave(id).await {
            Ok(()) => ControlResponse::Left { id },
            Err(e) => failure(e),
        },
        ControlRequest::Partner { id } => {
            if !lobby.registry().is_active(id).await {
                return failure(DuetError::UnknownParticipant(id));
            }
            ControlResponse::Partner {
                id,
                partner: lobby.partner_of(id).await,
            }
        }
        ControlRequest::Status => ControlResponse::Status {
            players: lobby.snapshot().await,
        },
    }
}

fn failure(error: DuetError) -> ControlResponse {
    match error {
        DuetError::UnknownParticipant(_) => ControlResponse::error("no active player with that id"),
        other => ControlResponse::error(other.to_string()),
    }
}

/// Send a response as a JSON text frame.
async fn send_response(
    sink: &mut WsSink,
    response: &ControlResponse,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let json = match serde_json::to_string(response) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode control response");
            return Ok(());
        }
    };
    sink.send(Message::Text(json.into())).await
}
