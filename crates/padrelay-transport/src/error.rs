use std::net::SocketAddr;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The UDP socket or TCP listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Sending a datagram failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// The inbound event receiver is gone.
    #[error("transport shut down")]
    Shutdown,
}
