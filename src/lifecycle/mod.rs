//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     Ctrl+C → main triggers Shutdown
//!
//! Shutdown (shutdown.rs):
//!     trigger → accept loop stops → process exits
//! ```
//!
//! # Design Decisions
//! - Stopping the accept loop is the whole shutdown: established tunnels
//!   are not drained and die with the process

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
