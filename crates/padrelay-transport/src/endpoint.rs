use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::net::{TcpListener, UdpSocket};

use crate::TransportError;

/// How often an ephemeral port is retried when the UDP side of the pair
/// turns out to be taken.
const EPHEMERAL_ATTEMPTS: usize = 8;

/// The UDP socket and TCP listener of one room, bound to the same port.
#[derive(Debug)]
pub struct RoomEndpoint {
    pub udp: Arc<UdpSocket>,
    pub tcp: TcpListener,
    pub port: u16,
}

impl RoomEndpoint {
    /// Binds TCP and UDP on `ip:port`.
    ///
    /// Port 0 picks a free TCP port and binds UDP on the same number,
    /// retrying with a new port if that UDP port is in use.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self, TransportError> {
        let attempts = if port == 0 { EPHEMERAL_ATTEMPTS } else { 1 };
        let mut last_err = None;

        for _ in 0..attempts {
            let tcp_addr = SocketAddr::new(ip, port);
            let tcp = TcpListener::bind(tcp_addr)
                .await
                .map_err(|source| TransportError::BindFailed {
                    addr: tcp_addr,
                    source,
                })?;
            let local = tcp
                .local_addr()
                .map_err(|source| TransportError::BindFailed {
                    addr: tcp_addr,
                    source,
                })?;

            let udp_addr = SocketAddr::new(ip, local.port());
            match UdpSocket::bind(udp_addr).await {
                Ok(udp) => {
                    tracing::info!(port = local.port(), %ip, "room endpoint bound");
                    return Ok(Self {
                        udp: Arc::new(udp),
                        tcp,
                        port: local.port(),
                    });
                }
                Err(source) => {
                    tracing::debug!(port = local.port(), error = %source, "udp port taken");
                    last_err = Some(TransportError::BindFailed {
                        addr: udp_addr,
                        source,
                    });
                }
            }
        }

        Err(last_err.unwrap_or(TransportError::Shutdown))
    }
}
