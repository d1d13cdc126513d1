//! Request classification.
//!
//! Each inbound request takes exactly one of three paths, chosen once per
//! session. First match wins:
//! 1. `CONNECT` → raw tunnel
//! 2. `Connection: ...upgrade...` and `Upgrade: websocket` → WebSocket relay
//! 3. anything else → plain forwarding

use axum::http::{header, HeaderMap, Method, Request};

use crate::http::headers::{has_token, value_is};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Forward,
    Connect,
    WebSocket,
}

impl RequestKind {
    pub fn classify<B>(request: &Request<B>) -> Self {
        Self::from_parts(request.method(), request.headers())
    }

    pub fn from_parts(method: &Method, headers: &HeaderMap) -> Self {
        if method == Method::CONNECT {
            RequestKind::Connect
        } else if has_token(headers, header::CONNECTION, "upgrade")
            && value_is(headers, header::UPGRADE, "websocket")
        {
            RequestKind::WebSocket
        } else {
            RequestKind::Forward
        }
    }
}
