//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection
//!     → server.rs (hyper HTTP/1.1, session id per request)
//!     → dispatch.rs (CONNECT / WebSocket / plain)
//!         → connect.rs   (dial, 200 Connection established, hijack, tunnel)
//!         → websocket.rs (dial, replay handshake, mirror 101, hijack both, tunnel)
//!         → forward.rs   (normalise target, one outbound request, stream back)
//!     → response.rs (proxy-generated responses)
//! ```

pub mod connect;
pub mod dispatch;
pub mod forward;
pub mod headers;
pub mod hijack;
pub mod response;
pub mod server;
pub mod websocket;

pub use dispatch::RequestKind;
pub use forward::{ForwardError, Forwarder, RequestBuildError};
pub use server::{ProxyServer, ProxyState};
