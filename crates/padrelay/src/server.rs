//! `RelayServer` builder and event loop.
//!
//! The server runs one room under a [`RoomManager`] and stands in for the
//! lobby: it logs every [`LobbyEvent`] and stops once the room is gone.

use std::future::Future;
use std::net::IpAddr;

use padrelay_room::{LobbyEvent, RoomConfig, RoomManager};
use tokio::sync::mpsc;

use crate::PadrelayError;

/// Builder for a [`RelayServer`].
pub struct RelayServerBuilder {
    config: RoomConfig,
    port: u16,
    expected_clients: Option<usize>,
}

impl RelayServerBuilder {
    pub fn new() -> Self {
        Self {
            config: RoomConfig::default(),
            port: 0,
            expected_clients: None,
        }
    }

    /// Replaces the whole room configuration. Call before [`bind`](Self::bind).
    pub fn config(mut self, config: RoomConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, ip: IpAddr) -> Self {
        self.config.bind_ip = ip;
        self
    }

    /// Port for both sockets. 0 (the default) picks a free one.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// How many players the room waits for before releasing the
    /// registration table. Also arms the zombie timer.
    pub fn expected_clients(mut self, count: usize) -> Self {
        self.expected_clients = Some(count);
        self
    }

    /// Binds the room.
    pub async fn build(self) -> Result<RelayServer, PadrelayError> {
        let (tx, events) = mpsc::unbounded_channel();
        let mut manager = RoomManager::new(self.config, tx);
        let port = manager.create_room(self.port, self.expected_clients).await?;
        Ok(RelayServer {
            manager,
            events,
            port,
        })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A single running room plus the loop that watches it.
pub struct RelayServer {
    manager: RoomManager,
    events: mpsc::UnboundedReceiver<LobbyEvent>,
    port: u16,
}

impl RelayServer {
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    /// The port both sockets are bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn manager(&self) -> &RoomManager {
        &self.manager
    }

    /// Logs room events until the room is destroyed.
    ///
    /// When `shutdown` resolves first, the room is asked to close and this
    /// returns once it has.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut shutting_down = false;

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else { break };
                    log_event(&event);
                    if matches!(event, LobbyEvent::RoomDestroyed { .. })
                        && self.manager.room_count() == 0
                    {
                        break;
                    }
                }
                _ = &mut shutdown, if !shutting_down => {
                    tracing::info!(port = self.port, "shutdown requested");
                    shutting_down = true;
                    self.manager.shutdown_all().await;
                }
            }
        }
        tracing::info!(port = self.port, "server stopped");
    }
}

fn log_event(event: &LobbyEvent) {
    match event {
        LobbyEvent::RoomCreated { port } => tracing::info!(port, "room open"),
        LobbyEvent::RoomDestroyed { port } => tracing::info!(port, "room destroyed"),
        LobbyEvent::Desynced { port } => tracing::warn!(port, "players desynced"),
        LobbyEvent::PlayerRegistered { port, slot } => {
            tracing::info!(port, %slot, "player joined")
        }
        LobbyEvent::LogLine { port, text } => tracing::info!(port, "{text}"),
    }
}

