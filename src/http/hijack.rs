//! Taking a client connection away from the HTTP server.
//!
//! hyper hands the connection over through its upgrade mechanism once the
//! response head is on the wire. The upgraded stream is downcast back to the
//! accepted `TcpStream`, together with whatever hyper had read past the
//! request head. From then on the server writes nothing more to it.

use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpStream;

use crate::net::TunnelEnd;

/// A raw connection plus its already-buffered unread bytes.
pub type Hijacked = TunnelEnd<TcpStream>;

#[derive(Debug, Error)]
pub enum HijackError {
    #[error("connection upgrade failed")]
    Upgrade(#[source] hyper::Error),
    #[error("upgraded connection is not a TCP stream")]
    NotTcp,
}

/// Wait for the upgrade and take ownership of the underlying stream.
pub async fn hijack(on_upgrade: OnUpgrade) -> Result<Hijacked, HijackError> {
    let upgraded = on_upgrade.await.map_err(HijackError::Upgrade)?;
    let parts = upgraded
        .downcast::<TokioIo<TcpStream>>()
        .map_err(|_| HijackError::NotTcp)?;

    Ok(TunnelEnd::new(parts.io.into_inner(), parts.read_buf))
}
