use std::net::SocketAddr;

use bytes::Bytes;
use padrelay_protocol::{TcpRequest, UdpMessage};
use tokio::sync::mpsc;

use crate::ConnectionId;

/// Sender used by the room to write response bytes to one TCP connection.
///
/// Unbounded so the synchronous registry can answer without awaiting. The
/// connection's writer task drains it; dropping every sender closes the
/// write half once the queue is flushed.
pub type OutboundTx = mpsc::UnboundedSender<Bytes>;

/// Everything the network layer hands to a room.
#[derive(Debug)]
pub enum InboundEvent {
    /// A well-formed UDP datagram.
    Datagram {
        peer: SocketAddr,
        message: UdpMessage,
    },

    /// A TCP client connected. `outbound` is how the room answers it.
    Connected {
        conn: ConnectionId,
        peer: SocketAddr,
        outbound: OutboundTx,
    },

    /// A complete request decoded from a TCP connection.
    Request {
        conn: ConnectionId,
        request: TcpRequest,
    },

    /// The TCP connection is gone. Emitted exactly once per `Connected`.
    Disconnected {
        conn: ConnectionId,
        /// Best-effort human-readable reason, for logging.
        reason: String,
    },
}
