//! The room layer's boundary with the lobby.

use padrelay_protocol::PlayerSlot;

/// Emitted upward by rooms. The lobby reacts to these only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    /// Both sockets are bound; the room accepts traffic.
    RoomCreated { port: u16 },
    /// The room is closed and its port may be reused.
    RoomDestroyed { port: u16 },
    /// Two players' machine states diverged. Sent at most once per room.
    Desynced { port: u16 },
    /// A slot was registered for the first time.
    PlayerRegistered { port: u16, slot: PlayerSlot },
    /// A line for the lobby's log.
    LogLine { port: u16, text: String },
}

impl LobbyEvent {
    pub fn port(&self) -> u16 {
        match self {
            Self::RoomCreated { port }
            | Self::RoomDestroyed { port }
            | Self::Desynced { port }
            | Self::PlayerRegistered { port, .. }
            | Self::LogLine { port, .. } => *port,
        }
    }
}

/// Sent down by the lobby, dispatched by
/// [`RoomManager::handle_command`](crate::RoomManager::handle_command).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyCommand {
    /// Open a room. Port 0 picks a free one.
    CreateRoom {
        port: u16,
        expected_clients: Option<usize>,
    },
    SetExpectedClientCount { port: u16, count: usize },
    RequestShutdown { port: u16 },
}
