//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)           CLI listen address
//!     → loader.rs (parse)           │
//!     → validation.rs               │
//!     → ProxyConfig ◀───────────────┘ (overrides bind_address)
//!     → read-only for the lifetime of the proxy
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ListenerConfig, ObservabilityConfig, ProxyConfig, TimeoutConfig};
pub use validation::{validate_config, ValidationError};
