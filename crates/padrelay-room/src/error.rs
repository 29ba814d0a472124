//! Error types for the room layer.

use padrelay_transport::TransportError;

/// Errors that can occur during room operations. Rooms are keyed by port.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// A live room already owns this port.
    #[error("port {0} is already in use by a room")]
    PortInUse(u16),

    /// No live room on this port.
    #[error("no room on port {0}")]
    NotFound(u16),

    /// The room's sockets could not be bound.
    #[error("could not open room on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: TransportError,
    },

    /// The room's command channel is closed; it is shutting down.
    #[error("room {0} is unavailable")]
    Unavailable(u16),
}
