//! Network plumbing for padrelay rooms.
//!
//! A room listens on one port number for both protocols: UDP for the
//! real-time input traffic and TCP for registration and asset exchange.
//! This crate binds the pair, runs the receive and accept loops, and turns
//! everything that arrives into [`InboundEvent`]s on a single channel so the
//! room actor can handle it sequentially.
//!
//! Every loop takes a [`CancellationToken`](tokio_util::sync::CancellationToken);
//! cancelling it stops the loops and closes every open TCP connection.

mod endpoint;
mod error;
mod event;
mod tcp;
mod udp;

pub use endpoint::RoomEndpoint;
pub use error::TransportError;
pub use event::{InboundEvent, OutboundTx};
pub use tcp::run_tcp_acceptor;
pub use udp::{run_udp_receiver, send_datagram};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a TCP connection, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
