use std::net::SocketAddr;

use bytes::Bytes;
use futures_util::{Sink, SinkExt, StreamExt};
use padrelay_protocol::RequestCodec;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use crate::{ConnectionId, InboundEvent};

/// Accepts TCP connections until cancelled.
///
/// Each connection gets its own reader task decoding with `codec`. On
/// cancellation the listener is dropped and every connection task is
/// awaited, so when this returns no socket of the room is left open.
pub async fn run_tcp_acceptor(
    listener: TcpListener,
    tx: mpsc::Sender<InboundEvent>,
    codec: RequestCodec,
    cancel: CancellationToken,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            res = listener.accept() => match res {
                Ok((stream, peer)) => {
                    let conn = ConnectionId::next();
                    tracing::debug!(%conn, %peer, "accepted tcp connection");
                    connections.spawn(handle_connection(
                        stream,
                        peer,
                        conn,
                        tx.clone(),
                        codec.clone(),
                        cancel.child_token(),
                    ));
                }
                Err(e) => tracing::warn!(error = %e, "tcp accept failed"),
            },
            // Reap finished connection tasks so the set does not grow.
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = cancel.cancelled() => break,
        }
    }

    drop(listener);
    while connections.join_next().await.is_some() {}
    tracing::debug!("tcp acceptor stopped");
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    conn: ConnectionId,
    tx: mpsc::Sender<InboundEvent>,
    codec: RequestCodec,
    cancel: CancellationToken,
) {
    let _ = stream.set_nodelay(true);
    let (read, write) = stream.into_split();

    let (out_tx, out_rx) = mpsc::unbounded_channel::<Bytes>();
    let mut writer = spawn_writer(FramedWrite::new(write, BytesCodec::new()), out_rx);

    if tx
        .send(InboundEvent::Connected {
            conn,
            peer,
            outbound: out_tx,
        })
        .await
        .is_err()
    {
        writer.abort();
        return;
    }

    let mut frames = FramedRead::new(read, codec);
    let reason = loop {
        let next = tokio::select! {
            next = frames.next() => next,
            _ = cancel.cancelled() => break "room closing".to_string(),
        };
        match next {
            Some(Ok(request)) => {
                tracing::debug!(%conn, request = request.name(), "tcp request");
                if tx.send(InboundEvent::Request { conn, request }).await.is_err() {
                    break "room gone".to_string();
                }
            }
            Some(Err(e)) => {
                tracing::warn!(%conn, %peer, error = %e, "closing connection");
                break format!("protocol error: {e}");
            }
            None => break "eof".to_string(),
        }
    };
    drop(frames);

    let _ = tx
        .send(InboundEvent::Disconnected {
            conn,
            reason: reason.clone(),
        })
        .await;

    // The writer finishes once the room drops its outbound handle, which
    // flushes any answer still queued for this connection.
    tokio::select! {
        _ = &mut writer => {}
        _ = cancel.cancelled() => writer.abort(),
    }
    tracing::debug!(%conn, %reason, "tcp connection closed");
}

fn spawn_writer<S>(mut sink: S, mut rx: mpsc::UnboundedReceiver<Bytes>) -> JoinHandle<()>
where
    S: Sink<Bytes, Error = std::io::Error> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if let Err(e) = sink.send(bytes).await {
                tracing::debug!(error = %e, "tcp write failed");
                break;
            }
        }
        let _ = sink.close().await;
    })
}
