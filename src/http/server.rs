//! HTTP server for the forward proxy.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Serve each connection with hyper's HTTP/1.1 server, upgrades enabled
//! - Assign a session id per request and dispatch on its kind
//! - Stop accepting when shutdown is signalled
//!
//! axum's `Router` is not used here: CONNECT requests carry an
//! authority-form target that no route can match, so every request goes
//! through a single `service_fn`.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, Response};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::{ProxyConfig, TimeoutConfig};
use crate::http::dispatch::RequestKind;
use crate::http::forward::Forwarder;
use crate::http::{connect, websocket};
use crate::net::listener::ListenerError;
use crate::net::{ConnectionPermit, Dialer, Listener, SessionId};

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Shared, read-only state handed to every connection.
#[derive(Clone)]
pub struct ProxyState {
    dialer: Dialer,
    forwarder: Forwarder,
}

impl ProxyState {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let dialer = Dialer::new(timeouts.connect());
        let forwarder = Forwarder::new(dialer.clone(), timeouts.request());
        Self { dialer, forwarder }
    }

    /// Handle one inbound request as its own session.
    pub async fn handle(&self, request: Request<Incoming>) -> Response<Body> {
        let session = SessionId::next();
        let span = tracing::info_span!("session", id = session.as_u64());

        async move {
            let kind = RequestKind::classify(&request);
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
                host = request
                    .headers()
                    .get(header::HOST)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default(),
                "Request start"
            );

            let response = match kind {
                RequestKind::Connect => connect::handle(&self.dialer, request).await,
                RequestKind::WebSocket => websocket::handle(&self.dialer, request).await,
                RequestKind::Forward => self.forwarder.handle(request).await,
            };

            tracing::info!(kind = ?kind, status = response.status().as_u16(), "Request end");
            response
        }
        .instrument(span)
        .await
    }
}

/// The forward proxy server.
pub struct ProxyServer {
    state: ProxyState,
}

impl ProxyServer {
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            state: ProxyState::new(&config.timeouts),
        }
    }

    /// Accept and serve connections until `shutdown` fires.
    ///
    /// Connections already being served, including established tunnels,
    /// keep running after the accept loop stops.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        if let Ok(address) = listener.local_addr() {
            tracing::info!(address = %address, "Proxy server starting");
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signalled, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let state = self.state.clone();
                        tokio::spawn(serve_connection(state, stream, peer, permit));
                    }
                    Err(ListenerError::Accept(err)) => {
                        tracing::warn!(error = %err, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                    Err(err) => return Err(err),
                },
            }
        }

        tracing::info!("Proxy server stopped");
        Ok(())
    }
}

async fn serve_connection(
    state: ProxyState,
    stream: TcpStream,
    peer: SocketAddr,
    permit: ConnectionPermit,
) {
    if let Err(err) = stream.set_nodelay(true) {
        tracing::debug!(peer = %peer, error = %err, "Cannot set TCP_NODELAY");
    }

    // Requests carry the slot so a hijacked tunnel keeps it after hyper
    // lets go of the connection.
    let service = service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(permit.clone());
        let state = state.clone();
        async move { Ok::<_, Infallible>(state.handle(request).await) }
    });

    // No automatic `Date`: the CONNECT acknowledgement and mirrored 101
    // heads must carry only the headers they were given.
    let connection = http1::Builder::new()
        .preserve_header_case(true)
        .title_case_headers(true)
        .auto_date_header(false)
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades();

    if let Err(err) = connection.await {
        tracing::debug!(peer = %peer, error = %err, "Connection ended with error");
    }
}
