//! Session identifiers for log correlation.
//!
//! One session per inbound request. The id is the only process-wide mutable
//! state in the proxy.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global atomic counter for session IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a proxied request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate the next session ID.
    pub fn next() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
