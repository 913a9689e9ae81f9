//! Process wiring: bind every socket up front, then run the slot listeners
//! and the control endpoint.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use duet_common::{ConfigError, DuetError};
use duet_config::DuetConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::connection;
use crate::listener::{bind_video_listeners, LinkSettings, SlotListener};
use crate::lobby::Lobby;
use crate::registry::Registry;

pub struct Server {
    lobby: Lobby,
    control: TcpListener,
    video: Vec<TcpListener>,
    settings: LinkSettings,
}

impl Server {
    /// Bind the video listeners and the control endpoint. Any bind failure
    /// is a configuration error.
    pub async fn bind(config: &DuetConfig) -> Result<Self, DuetError> {
        let video = bind_video_listeners(&config.video, config.pool.capacity).await?;
        let ports = video
            .iter()
            .map(|listener| listener.local_addr().map(|addr| addr.port()))
            .collect::<Result<Vec<_>, _>>()?;

        let settings = LinkSettings::from_config(&config.video);
        let lobby = Lobby::new(Registry::with_ports(ports), settings.buffer_size);

        let ip: IpAddr = config
            .control
            .bind
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("control.bind: {e}")))?;
        let addr = SocketAddr::new(ip, config.control.port);
        let control = TcpListener::bind(addr)
            .await
            .map_err(|source| ConfigError::Bind { addr, source })?;

        Ok(Self {
            lobby,
            control,
            video,
            settings,
        })
    }

    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    pub fn control_addr(&self) -> std::io::Result<SocketAddr> {
        self.control.local_addr()
    }

    /// Video port of every slot, in identity order.
    pub fn video_ports(&self) -> Vec<u16> {
        self.lobby
            .registry()
            .players()
            .map(|player| player.video_port())
            .collect()
    }

    /// Spawn one connection manager per slot and serve control clients.
    pub async fn run(self) {
        let Self {
            lobby,
            control,
            video,
            settings,
        } = self;

        for (player, listener) in lobby.registry().players().zip(video) {
            let slot = SlotListener::new(Arc::clone(player), listener, lobby.clone(), settings);
            tokio::spawn(slot.run());
        }

        match control.local_addr() {
            Ok(addr) => info!(addr = %addr, players = lobby.registry().capacity(), "duet listening"),
            Err(_) => info!("duet listening"),
        }
        connection::serve(control, lobby).await;
    }
}
