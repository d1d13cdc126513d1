//! Responses the proxy produces itself.
//!
//! # Responsibilities
//! - Plain-text error responses for dial, forward and handshake failures
//! - The `200 Connection established` acknowledgement for CONNECT
//!
//! Error bodies carry the underlying error text. The wording is meant for
//! people reading logs and browsers, not for machine parsing.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response, StatusCode};
use hyper::ext::ReasonPhrase;

pub const CONNECTION_ESTABLISHED: &[u8] = b"Connection established";

/// A `text/plain` response with the given status and message body.
pub fn plain_text(status: StatusCode, message: impl Into<String>) -> Response<Body> {
    let mut response = Response::new(Body::from(message.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

/// `HTTP/1.1 200 Connection established` with no body.
pub fn connection_established() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    response
        .extensions_mut()
        .insert(ReasonPhrase::from_static(CONNECTION_ESTABLISHED));
    response
}
