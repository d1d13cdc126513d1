//! Bidirectional byte relay for CONNECT and WebSocket tunnels.
//!
//! # Data Flow
//! ```text
//! client ──(upstream, this task)──────▶ origin
//! client ◀─(downstream, spawned task)── origin
//! ```
//!
//! When the client finishes sending, the origin's write side is shut down and
//! the origin → client direction keeps running until the origin closes, so a
//! half-closed client still gets the rest of the answer. Any error, or the
//! origin finishing first, cancels the other direction and drops both
//! streams, which closes them. There is no idle timeout; only the endpoints
//! end a tunnel.

use std::io;

use hyper::body::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::Instrument;

/// One side of a tunnel: a duplex stream plus bytes already read from it
/// that still have to reach the other side.
#[derive(Debug)]
pub struct TunnelEnd<S> {
    io: S,
    pending: Bytes,
}

impl<S> TunnelEnd<S> {
    pub fn new(io: S, pending: Bytes) -> Self {
        Self { io, pending }
    }

    /// A stream with nothing buffered, e.g. a freshly dialed origin.
    pub fn fresh(io: S) -> Self {
        Self::new(io, Bytes::new())
    }

    pub fn into_inner(self) -> (S, Bytes) {
        (self.io, self.pending)
    }
}

/// Byte counts per direction. `None` means the direction failed or was cut
/// off.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TunnelStats {
    pub client_to_origin: Option<u64>,
    pub origin_to_client: Option<u64>,
}

/// Relay bytes between `client` and `origin` until the origin closes or
/// either direction errors.
///
/// Both streams are closed when this returns.
pub async fn relay<C, O>(client: TunnelEnd<C>, origin: TunnelEnd<O>) -> TunnelStats
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    O: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_io, client_pending) = client.into_inner();
    let (origin_io, origin_pending) = origin.into_inner();
    let (mut client_rd, mut client_wr) = tokio::io::split(client_io);
    let (mut origin_rd, mut origin_wr) = tokio::io::split(origin_io);

    let mut downstream = tokio::spawn(
        async move {
            let result = copy_with_pending(&origin_pending, &mut origin_rd, &mut client_wr).await;
            let _ = client_wr.shutdown().await;
            result
        }
        .in_current_span(),
    );

    let upstream = async {
        let result = copy_with_pending(&client_pending, &mut client_rd, &mut origin_wr).await;
        let _ = origin_wr.shutdown().await;
        result
    };
    tokio::pin!(upstream);

    let mut stats = TunnelStats::default();
    tokio::select! {
        result = &mut upstream => {
            let half_closed = result.is_ok();
            stats.client_to_origin = finished("client->origin", result);
            if !half_closed {
                downstream.abort();
            }
            if let Ok(result) = (&mut downstream).await {
                stats.origin_to_client = finished("origin->client", result);
            }
        }
        joined = &mut downstream => {
            if let Ok(result) = joined {
                stats.origin_to_client = finished("origin->client", result);
            }
        }
    }

    stats
}

async fn copy_with_pending<R, W>(pending: &[u8], reader: &mut R, writer: &mut W) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if !pending.is_empty() {
        writer.write_all(pending).await?;
    }
    let copied = tokio::io::copy(reader, writer).await?;
    Ok(pending.len() as u64 + copied)
}

fn finished(direction: &'static str, result: io::Result<u64>) -> Option<u64> {
    match result {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            tracing::debug!(direction, error = %err, "Tunnel copy ended with error");
            None
        }
    }
}
