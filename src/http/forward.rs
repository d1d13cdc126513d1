//! Plain HTTP forwarding.
//!
//! # Responsibilities
//! - Normalise the request target (explicit-proxy absolute URLs and
//!   transparently intercepted origin-form requests alike)
//! - Execute exactly one outbound call, bounded by the request timeout
//! - Stream the origin response back with status and headers unchanged
//!
//! # Design Decisions
//! - No retries: at most one outbound call per inbound request
//! - Bodies stream in both directions; nothing is buffered in memory
//! - Failures become a uniform 502; the error class only goes to the log
//! - The request timeout stops at the response head. Unlike a Go
//!   `http.Client.Timeout`, it does not bound reading the body, so long
//!   downloads are not cut off mid-stream

use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, InvalidUri, InvalidUriParts, PathAndQuery, Scheme};
use axum::http::{header, HeaderMap, Method, Request, Response, StatusCode, Uri, Version};
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::http::headers::{copy_headers, strip_hop_by_hop};
use crate::http::response::plain_text;
use crate::net::{classify, error_chain, Dialer};

/// The outbound request could not be constructed from the inbound one.
#[derive(Debug, Error)]
pub enum RequestBuildError {
    #[error("no host in request URL or Host header")]
    MissingHost,
    #[error("invalid Host header")]
    InvalidHost(#[source] InvalidUri),
    #[error("unsupported protocol scheme {0:?}")]
    UnsupportedScheme(String),
    #[error("invalid request URL")]
    InvalidUri(#[from] InvalidUriParts),
}

/// The outbound call failed.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("{method} \"{uri}\"")]
    Upstream {
        method: Method,
        uri: Uri,
        #[source]
        source: hyper_util::client::legacy::Error,
    },
    #[error("{method} \"{uri}\": request timed out after {timeout:?}")]
    Timeout {
        method: Method,
        uri: Uri,
        timeout: Duration,
        #[source]
        source: tokio::time::error::Elapsed,
    },
}

/// Fill in what a transparently intercepted request leaves out: scheme
/// `http` and the host from the `Host` header.
pub fn normalize_target(uri: &Uri, headers: &HeaderMap) -> Result<Uri, RequestBuildError> {
    let mut parts = uri.clone().into_parts();

    if parts.scheme.is_none() {
        parts.scheme = Some(Scheme::HTTP);
    }
    if parts.authority.is_none() {
        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .filter(|host| !host.is_empty())
            .ok_or(RequestBuildError::MissingHost)?;
        parts.authority = Some(host.parse::<Authority>().map_err(RequestBuildError::InvalidHost)?);
    }
    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }

    let uri = Uri::from_parts(parts)?;
    match uri.scheme_str() {
        Some("http") => Ok(uri),
        other => Err(RequestBuildError::UnsupportedScheme(
            other.unwrap_or_default().to_string(),
        )),
    }
}

/// Build the outbound request: same method, headers and body, normalised
/// target, hop-by-hop headers removed.
pub fn outbound_request(request: Request<Body>) -> Result<Request<Body>, RequestBuildError> {
    let (mut parts, body) = request.into_parts();
    parts.uri = normalize_target(&parts.uri, &parts.headers)?;
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    Ok(Request::from_parts(parts, body))
}

/// Executes forwarded requests on a shared, read-only HTTP client.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<Dialer, Body>,
    request_timeout: Duration,
}

impl Forwarder {
    pub fn new(dialer: Dialer, request_timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .http1_preserve_header_case(true)
            .http1_title_case_headers(true)
            .retry_canceled_requests(false)
            .build(dialer);

        Self {
            client,
            request_timeout,
        }
    }

    /// Send one request and wait for the response head.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Incoming>, ForwardError> {
        let method = request.method().clone();
        let uri = request.uri().clone();

        match tokio::time::timeout(self.request_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(source)) => Err(ForwardError::Upstream { method, uri, source }),
            Err(source) => Err(ForwardError::Timeout {
                method,
                uri,
                timeout: self.request_timeout,
                source,
            }),
        }
    }

    /// Forward an inbound request and turn the outcome into the client response.
    pub async fn handle(&self, request: Request<Incoming>) -> Response<Body> {
        let outbound = match outbound_request(request.map(Body::new)) {
            Ok(outbound) => outbound,
            Err(err) => {
                let message = error_chain(&err);
                tracing::warn!(error = %message, "New request error");
                return plain_text(StatusCode::BAD_GATEWAY, format!("New request error: {}", message));
            }
        };

        match self.forward(outbound).await {
            Ok(response) => relay_response(response),
            Err(err) => {
                let class = classify(&err);
                let message = error_chain(&err);
                tracing::warn!(class = %class, error = %message, "Request error");
                plain_text(StatusCode::BAD_GATEWAY, format!("Request error: {}", message))
            }
        }
    }
}

/// Client response mirroring the origin's status and headers, body streamed.
fn relay_response(origin: Response<Incoming>) -> Response<Body> {
    let (parts, body) = origin.into_parts();

    let mut response = Response::new(Body::new(body));
    *response.status_mut() = parts.status;
    copy_headers(&parts.headers, response.headers_mut());
    response
}
