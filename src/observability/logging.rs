//! Structured logging.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate and everything else stays at `warn`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global subscriber. Call once, before anything logs.
pub fn init(config: &ObservabilityConfig) {
    tracing_subscriber::registry()
        .with(filter(config))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive(&config.log_level).into())
}

fn default_directive(level: &str) -> String {
    format!("warn,forward_proxy={}", level.to_ascii_lowercase())
}
