//! Header policy for forwarded traffic.
//!
//! `HeaderMap` is the ordered multimap: names match case-insensitively and
//! repeated values keep their order.

use axum::http::header::{HeaderMap, HeaderName};

/// Hop-by-hop header that never reaches the origin.
pub const PROXY_CONNECTION: HeaderName = HeaderName::from_static("proxy-connection");

/// Remove headers that only concern the client → proxy hop.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    headers.remove(PROXY_CONNECTION);
}

/// Copy every header of `src` onto `dst`. A name present in both ends up
/// with exactly the values from `src`.
pub fn copy_headers(src: &HeaderMap, dst: &mut HeaderMap) {
    for name in src.keys() {
        dst.remove(name);
        for value in src.get_all(name) {
            dst.append(name.clone(), value.clone());
        }
    }
}

/// Whether any comma-separated token of header `name` equals `token`.
pub fn has_token(headers: &HeaderMap, name: impl AsRef<str>, token: &str) -> bool {
    headers
        .get_all(name.as_ref())
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|part| part.trim().eq_ignore_ascii_case(token))
}

/// Whether the first value of header `name` equals `expected`, ignoring case.
pub fn value_is(headers: &HeaderMap, name: impl AsRef<str>, expected: &str) -> bool {
    headers
        .get(name.as_ref())
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case(expected))
}
