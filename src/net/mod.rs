//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → Hand off to HTTP layer (session.rs assigns an id per request)
//!
//! Outbound
//!     → dialer.rs (resolve + connect under one deadline)
//!     → error.rs (classify failures for logging)
//!     → tunnel.rs (raw relay once CONNECT/WebSocket is established)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - One dialer serves both raw tunnels and the forwarding client
//! - Tunnels close both ends once the origin closes or a copy fails; a
//!   client EOF only half-closes toward the origin

pub mod dialer;
pub mod error;
pub mod listener;
pub mod session;
pub mod tunnel;

pub use dialer::Dialer;
pub use error::{classify, error_chain, DialError, ErrorClass};
pub use listener::{ConnectionPermit, Listener};
pub use session::SessionId;
pub use tunnel::{relay, TunnelEnd, TunnelStats};
