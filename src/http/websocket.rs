//! WebSocket relaying.
//!
//! # Data Flow
//! ```text
//! Client ──upgrade request──▶ Proxy ──same head, raw socket──▶ Origin
//! Client ◀──101 + origin headers── Proxy ◀──────101────────── Origin
//! Client ◀════════════ opaque bytes (net::tunnel) ══════════▶ Origin
//! ```
//!
//! # Design Decisions
//! - The opening handshake is negotiated by the two endpoints; the proxy
//!   only carries it
//! - Frames are never parsed
//! - A non-101 answer from the origin goes back as an ordinary response

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, Response, StatusCode, Uri, Version};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::http::headers::{copy_headers, strip_hop_by_hop};
use crate::http::hijack::hijack;
use crate::http::response::plain_text;
use crate::net::{classify, error_chain, relay, ConnectionPermit, Dialer};

const DEFAULT_WEBSOCKET_PORT: u16 = 80;

pub async fn handle(dialer: &Dialer, mut request: Request<Incoming>) -> Response<Body> {
    let origin = match dialer
        .dial_target(request.uri(), request.headers(), DEFAULT_WEBSOCKET_PORT)
        .await
    {
        Ok(origin) => origin,
        Err(err) => {
            let message = error_chain(&err);
            tracing::warn!(class = %classify(&err), error = %message, "WSConnect error");
            return plain_text(StatusCode::BAD_GATEWAY, format!("WSConnect error: {}", message));
        }
    };

    let handshake = match handshake_request(request.uri(), request.headers()) {
        Ok(handshake) => handshake,
        Err(err) => {
            tracing::warn!(error = %err, "Cannot reconstruct handshake");
            return plain_text(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("WSConnect dump error: {}", err),
            );
        }
    };

    tracing::debug!(
        url = %websocket_url(request.uri(), request.headers()),
        "Forwarding WebSocket handshake"
    );

    let mut origin_response = match send_handshake(origin, handshake).await {
        Ok(response) => response,
        Err(err) => {
            let message = error_chain(&err);
            tracing::warn!(class = %classify(&err), error = %message, "WSConnect error");
            return plain_text(StatusCode::BAD_GATEWAY, format!("WSConnect error: {}", message));
        }
    };

    if origin_response.status() != StatusCode::SWITCHING_PROTOCOLS {
        tracing::info!(status = origin_response.status().as_u16(), "WSConnect refused by origin");
        let (parts, body) = origin_response.into_parts();
        return Response::from_parts(parts, Body::new(body));
    }

    let origin_upgrade = hyper::upgrade::on(&mut origin_response);
    let client_upgrade = hyper::upgrade::on(&mut request);
    let permit = request.extensions_mut().remove::<ConnectionPermit>();

    tokio::spawn(
        async move {
            let _permit = permit;
            match tokio::try_join!(hijack(client_upgrade), hijack(origin_upgrade)) {
                Ok((client, origin)) => {
                    tracing::info!("WSConnect success");
                    let stats = relay(client, origin).await;
                    tracing::info!(
                        client_to_origin = ?stats.client_to_origin,
                        origin_to_client = ?stats.origin_to_client,
                        "Tunnel closed"
                    );
                }
                Err(err) => {
                    tracing::error!(error = %error_chain(&err), "WSConnect hijack failed");
                }
            }
        }
        .in_current_span(),
    );

    // The origin's head as received, header case included.
    let (parts, _) = origin_response.into_parts();
    Response::from_parts(parts, Body::empty())
}

/// Rebuild the opening handshake for the origin: same method, origin-form
/// target and headers, no body.
pub fn handshake_request(uri: &Uri, headers: &HeaderMap) -> Result<Request<Body>, axum::http::Error> {
    let target = uri
        .path_and_query()
        .map(|path| path.as_str())
        .unwrap_or("/");

    let mut builder = Request::get(target).version(Version::HTTP_11);
    if let Some(outbound) = builder.headers_mut() {
        copy_headers(headers, outbound);
        strip_hop_by_hop(outbound);
    }
    builder.body(Body::empty())
}

/// The request URL as the origin sees it: scheme `ws`, host from `Host`.
pub fn websocket_url(uri: &Uri, headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.authority().map(|authority| authority.as_str()))
        .unwrap_or_default();
    let path = uri.path_and_query().map(|path| path.as_str()).unwrap_or("/");

    format!("ws://{}{}", host, path)
}

async fn send_handshake(
    origin: TcpStream,
    handshake: Request<Body>,
) -> Result<Response<Incoming>, hyper::Error> {
    let (mut sender, connection) = http1::Builder::new()
        .preserve_header_case(true)
        .title_case_headers(true)
        .handshake(TokioIo::new(origin))
        .await?;

    tokio::spawn(
        async move {
            if let Err(err) = connection.with_upgrades().await {
                tracing::debug!(error = %err, "Origin connection ended with error");
            }
        }
        .in_current_span(),
    );

    sender.send_request(handshake).await
}
