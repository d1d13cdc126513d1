//! CONNECT tunneling.
//!
//! ```text
//! DIALING ──fail──▶ 502 "Connect error: ..." (normal HTTP response, no hijack)
//!    │
//!    ▼ ok
//! ESTABLISHED: "HTTP/1.1 200 Connection established", connection hijacked
//!    │
//!    ▼
//! RELAYING (net::tunnel) ──either side closes──▶ CLOSED (both ends dropped)
//! ```

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use hyper::body::Incoming;
use tracing::Instrument;

use crate::http::hijack::hijack;
use crate::http::response::{connection_established, plain_text};
use crate::net::{classify, error_chain, relay, ConnectionPermit, Dialer, TunnelEnd};

/// CONNECT targets without a port are assumed to be TLS.
const DEFAULT_CONNECT_PORT: u16 = 443;

pub async fn handle(dialer: &Dialer, mut request: Request<Incoming>) -> Response<Body> {
    let origin = match dialer
        .dial_target(request.uri(), request.headers(), DEFAULT_CONNECT_PORT)
        .await
    {
        Ok(origin) => origin,
        Err(err) => {
            let message = error_chain(&err);
            tracing::warn!(class = %classify(&err), error = %message, "Connect error");
            return plain_text(StatusCode::BAD_GATEWAY, format!("Connect error: {}", message));
        }
    };

    let on_upgrade = hyper::upgrade::on(&mut request);
    let permit = request.extensions_mut().remove::<ConnectionPermit>();

    tokio::spawn(
        async move {
            let _permit = permit;
            let client = match hijack(on_upgrade).await {
                Ok(client) => client,
                Err(err) => {
                    tracing::error!(error = %error_chain(&err), "Connect hijack failed");
                    return;
                }
            };

            tracing::info!("Connect success");
            let stats = relay(client, TunnelEnd::fresh(origin)).await;
            tracing::info!(
                client_to_origin = ?stats.client_to_origin,
                origin_to_client = ?stats.origin_to_client,
                "Tunnel closed"
            );
        }
        .in_current_span(),
    );

    connection_established()
}
