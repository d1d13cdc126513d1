//! Outbound failure types and their classification.
//!
//! Classification only feeds log lines. Every failure reaches the client as
//! the same plain-text 502 regardless of its class.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Failure to open a raw TCP connection to an origin.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("invalid dial address {0:?}")]
    InvalidAddress(String),
    #[error("lookup {address}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("lookup {address}: no addresses found")]
    NoAddresses { address: String },
    #[error("dial tcp {address}: i/o timeout after {timeout:?}")]
    Timeout { address: String, timeout: Duration },
    #[error("dial tcp {address}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
}

impl DialError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DialError::InvalidAddress(_) => ErrorClass::Unclassified,
            DialError::Resolve { .. } | DialError::NoAddresses { .. } => ErrorClass::Dns,
            DialError::Timeout { .. } => ErrorClass::Timeout,
            DialError::Connect { source, .. } => io_class(source),
        }
    }
}

/// Log category of an outbound failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Name resolution failed.
    Dns,
    /// A network operation hit its deadline.
    Timeout,
    /// Any other socket or transport failure (refused, reset, closed early).
    Network,
    /// Nothing recognisable in the error chain.
    Unclassified,
}

impl ErrorClass {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorClass::Dns => "dns",
            ErrorClass::Timeout => "timeout",
            ErrorClass::Network => "net",
            ErrorClass::Unclassified => "gen",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn io_class(err: &io::Error) -> ErrorClass {
    match err.kind() {
        io::ErrorKind::TimedOut => ErrorClass::Timeout,
        _ => ErrorClass::Network,
    }
}

/// Walk an error's source chain and return the first recognisable category.
pub fn classify(err: &(dyn StdError + 'static)) -> ErrorClass {
    let mut current = Some(err);

    while let Some(err) = current {
        if let Some(dial) = err.downcast_ref::<DialError>() {
            return dial.class();
        }
        if err.is::<tokio::time::error::Elapsed>() {
            return ErrorClass::Timeout;
        }
        if let Some(hyper_err) = err.downcast_ref::<hyper::Error>() {
            if hyper_err.is_timeout() {
                return ErrorClass::Timeout;
            }
            if hyper_err.is_incomplete_message() || hyper_err.is_closed() || hyper_err.is_canceled() {
                return ErrorClass::Network;
            }
        }
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return io_class(io_err);
        }
        current = err.source();
    }

    ErrorClass::Unclassified
}

/// Render an error and its sources as one line, `outer: inner: root`.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();

    while let Some(cause) = current {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        current = cause.source();
    }

    message
}
