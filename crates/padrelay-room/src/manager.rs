//! Room manager: creates rooms on ports and routes lobby requests to them.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::room::spawn_room;
use crate::{LobbyCommand, LobbyEvent, RoomConfig, RoomError, RoomHandle, RoomInfo};

/// Tracks every live room by port.
///
/// This is the lobby-facing surface of the room layer: the lobby calls in
/// with typed methods or [`LobbyCommand`]s, and rooms report back through
/// the [`LobbyEvent`] channel given to [`RoomManager::new`].
pub struct RoomManager {
    config: RoomConfig,
    events: mpsc::UnboundedSender<LobbyEvent>,
    rooms: HashMap<u16, RoomHandle>,
}

impl RoomManager {
    pub fn new(config: RoomConfig, events: mpsc::UnboundedSender<LobbyEvent>) -> Self {
        Self {
            config,
            events,
            rooms: HashMap::new(),
        }
    }

    /// Opens a room on `port` (0 picks a free one) and returns the port.
    ///
    /// A port stays taken until its room reports
    /// [`LobbyEvent::RoomDestroyed`].
    pub async fn create_room(
        &mut self,
        port: u16,
        expected_clients: Option<usize>,
    ) -> Result<u16, RoomError> {
        self.prune_closed();
        if port != 0 && self.rooms.contains_key(&port) {
            return Err(RoomError::PortInUse(port));
        }

        let handle =
            spawn_room(port, expected_clients, self.config.clone(), self.events.clone()).await?;
        let port = handle.port();
        self.rooms.insert(port, handle);
        Ok(port)
    }

    pub async fn set_expected_client_count(
        &self,
        port: u16,
        count: usize,
    ) -> Result<(), RoomError> {
        self.handle(port)?.set_expected_clients(count).await
    }

    pub async fn request_shutdown(&self, port: u16) -> Result<(), RoomError> {
        self.handle(port)?.shutdown().await
    }

    /// Applies one lobby command.
    pub async fn handle_command(&mut self, command: LobbyCommand) -> Result<(), RoomError> {
        match command {
            LobbyCommand::CreateRoom {
                port,
                expected_clients,
            } => self.create_room(port, expected_clients).await.map(|_| ()),
            LobbyCommand::SetExpectedClientCount { port, count } => {
                self.set_expected_client_count(port, count).await
            }
            LobbyCommand::RequestShutdown { port } => self.request_shutdown(port).await,
        }
    }

    pub async fn room_info(&self, port: u16) -> Result<RoomInfo, RoomError> {
        self.handle(port)?.info().await
    }

    /// Asks every live room to close.
    pub async fn shutdown_all(&self) {
        for handle in self.rooms.values().filter(|h| !h.is_closed()) {
            let _ = handle.shutdown().await;
        }
    }

    /// Number of rooms that still hold their port.
    pub fn room_count(&self) -> usize {
        self.rooms.values().filter(|h| !h.is_closed()).count()
    }

    /// Ports of the rooms that are still live, ascending.
    pub fn room_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self
            .rooms
            .values()
            .filter(|h| !h.is_closed())
            .map(RoomHandle::port)
            .collect();
        ports.sort_unstable();
        ports
    }

    fn handle(&self, port: u16) -> Result<&RoomHandle, RoomError> {
        self.rooms
            .get(&port)
            .filter(|h| !h.is_closed())
            .ok_or(RoomError::NotFound(port))
    }

    fn prune_closed(&mut self) {
        self.rooms.retain(|_, handle| !handle.is_closed());
    }
}
