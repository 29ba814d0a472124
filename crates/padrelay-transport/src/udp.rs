use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use padrelay_protocol::UdpMessage;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{InboundEvent, TransportError};

/// Larger than any datagram a client sends; longer ones are truncated by
/// the OS and then rejected by the decoder.
const RECV_BUFFER_LEN: usize = 1024;

const RECV_BACKOFF_BASE: Duration = Duration::from_millis(1);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);
/// Consecutive receive errors before the failure is logged as a warning.
const RECV_WARN_AFTER: u32 = 8;

/// Delay before the next receive after `failures` consecutive errors.
///
/// A single error (ICMP noise) retries immediately; a socket that keeps
/// failing backs off exponentially up to [`RECV_BACKOFF_MAX`].
fn recv_backoff(failures: u32) -> Duration {
    match failures {
        0 | 1 => Duration::ZERO,
        n => RECV_BACKOFF_BASE
            .saturating_mul(1u32 << (n - 2).min(16))
            .min(RECV_BACKOFF_MAX),
    }
}

/// Receives datagrams until cancelled, forwarding the well-formed ones.
///
/// Malformed datagrams are logged and dropped. Returns when `cancel` fires
/// or the event receiver is gone.
pub async fn run_udp_receiver(
    socket: Arc<UdpSocket>,
    tx: mpsc::Sender<InboundEvent>,
    cancel: CancellationToken,
) {
    let mut buf = [0u8; RECV_BUFFER_LEN];
    let mut failures = 0u32;
    loop {
        let backoff = recv_backoff(failures);
        if !backoff.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = cancel.cancelled() => break,
            }
        }

        let (len, peer) = tokio::select! {
            res = socket.recv_from(&mut buf) => match res {
                Ok(received) => {
                    failures = 0;
                    received
                }
                Err(e) => {
                    // ICMP port-unreachable from a departed client shows up
                    // here on some platforms.
                    failures = failures.saturating_add(1);
                    if failures == RECV_WARN_AFTER {
                        tracing::warn!(error = %e, failures, "udp socket keeps failing, backing off");
                    } else {
                        tracing::debug!(error = %e, failures, "udp receive failed");
                    }
                    continue;
                }
            },
            _ = cancel.cancelled() => break,
        };

        let message = match UdpMessage::decode(&buf[..len]) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(%peer, len, error = %e, "dropping malformed datagram");
                continue;
            }
        };
        tracing::trace!(%peer, len, "datagram received");

        if tx.send(InboundEvent::Datagram { peer, message }).await.is_err() {
            break;
        }
    }
    tracing::debug!("udp receiver stopped");
}

/// Sends one encoded datagram to `peer`.
pub async fn send_datagram(
    socket: &UdpSocket,
    peer: SocketAddr,
    payload: &[u8],
) -> Result<(), TransportError> {
    socket
        .send_to(payload, peer)
        .await
        .map(|_| ())
        .map_err(TransportError::SendFailed)
}
