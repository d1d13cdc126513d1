//! Observability subsystem.
//!
//! Structured logging only: every line emitted while handling a request
//! carries the `session` span and its id, including lines from spawned
//! tunnel tasks.

pub mod logging;

pub use logging::init;
