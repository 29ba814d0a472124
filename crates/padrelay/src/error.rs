//! Unified error type for padrelay.

use padrelay_protocol::ProtocolError;
use padrelay_room::RoomError;
use padrelay_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates a `From` impl, so `?`
/// converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PadrelayError {
    /// Binding or sending on a socket failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A request could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room could not be created or reached.
    #[error(transparent)]
    Room(#[from] RoomError),
}
