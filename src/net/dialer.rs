//! Outbound TCP dialing.
//!
//! # Responsibilities
//! - Resolve and connect to origin addresses under a single dial deadline
//! - Derive `host:port` dial addresses from request targets
//! - Serve as the connector of the forwarding HTTP client
//!
//! The CONNECT and WebSocket handlers use [`Dialer::dial`] directly and keep
//! the raw stream; the forwarding client reaches the same code through the
//! `tower::Service<Uri>` impl.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::http::{header, HeaderMap, Uri};
use axum::http::uri::Authority;
use hyper_util::rt::TokioIo;
use tokio::net::{lookup_host, TcpStream};
use tower::Service;

use crate::net::error::DialError;

/// Opens raw origin connections, bounded by a connect timeout.
#[derive(Debug, Clone)]
pub struct Dialer {
    connect_timeout: Duration,
}

impl Dialer {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Dial `host:port`. Resolution and every connect attempt share one deadline.
    pub async fn dial(&self, address: &str) -> Result<TcpStream, DialError> {
        if !has_port(address) {
            return Err(DialError::InvalidAddress(address.to_string()));
        }

        match tokio::time::timeout(self.connect_timeout, connect(address)).await {
            Ok(result) => result,
            Err(_) => Err(DialError::Timeout {
                address: address.to_string(),
                timeout: self.connect_timeout,
            }),
        }
    }

    /// Dial the target of a request: the URL authority, else the `Host` header.
    pub async fn dial_target(
        &self,
        uri: &Uri,
        headers: &HeaderMap,
        default_port: u16,
    ) -> Result<TcpStream, DialError> {
        let address = target_address(uri, headers, default_port)?;
        self.dial(&address).await
    }
}

async fn connect(address: &str) -> Result<TcpStream, DialError> {
    let addrs = lookup_host(address)
        .await
        .map_err(|source| DialError::Resolve {
            address: address.to_string(),
            source,
        })?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Err(err) => {
                tracing::trace!(%addr, error = %err, "Connect attempt failed");
                last_error = Some(err);
            }
        }
    }

    Err(match last_error {
        Some(source) => DialError::Connect {
            address: address.to_string(),
            source,
        },
        None => DialError::NoAddresses {
            address: address.to_string(),
        },
    })
}

fn has_port(address: &str) -> bool {
    address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
}

/// `host:port` for an authority, filling in `default_port` when absent.
pub fn authority_address(authority: &Authority, default_port: u16) -> String {
    format!(
        "{}:{}",
        authority.host(),
        authority.port_u16().unwrap_or(default_port)
    )
}

/// Dial address of a request: URL authority first, then the `Host` header.
pub fn target_address(uri: &Uri, headers: &HeaderMap, default_port: u16) -> Result<String, DialError> {
    if let Some(authority) = uri.authority() {
        return Ok(authority_address(authority, default_port));
    }

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    host.parse::<Authority>()
        .map(|authority| authority_address(&authority, default_port))
        .map_err(|_| DialError::InvalidAddress(host.to_string()))
}

/// Default port for a URL scheme.
pub fn default_port(scheme: Option<&str>) -> u16 {
    match scheme {
        Some("https") | Some("wss") => 443,
        _ => 80,
    }
}

impl Service<Uri> for Dialer {
    type Response = TokioIo<TcpStream>;
    type Error = DialError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let dialer = self.clone();
        Box::pin(async move {
            let address = match uri.authority() {
                Some(authority) => authority_address(authority, default_port(uri.scheme_str())),
                None => return Err(DialError::InvalidAddress(uri.to_string())),
            };
            dialer.dial(&address).await.map(TokioIo::new)
        })
    }
}
