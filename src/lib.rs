//! Forward HTTP proxy library.
//!
//! Serves plain HTTP forwarding, CONNECT tunnels and WebSocket relaying on
//! one listener, for both explicit-proxy and transparently intercepted
//! clients.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
