//! Forward HTTP proxy.
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │                 FORWARD PROXY                │
//!   Client           │  ┌──────────┐   ┌─────────┐   ┌───────────┐  │
//!   ─────────────────┼─▶│ listener │──▶│ server  │──▶│ dispatch  │  │
//!                    │  └──────────┘   └─────────┘   └─────┬─────┘  │
//!                    │            ┌──────────────┬─────────┴───┐    │
//!                    │            ▼              ▼             ▼    │
//!                    │      ┌─────────┐    ┌──────────┐  ┌────────┐ │
//!                    │      │ forward │    │ connect  │  │   ws   │ │
//!                    │      └────┬────┘    └────┬─────┘  └───┬────┘ │
//!                    │           │              └──tunnel────┘      │      Origin
//!                    │           └────────────── dialer ────────────┼────▶ Server
//!                    └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use forward_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use forward_proxy::lifecycle::{shutdown_signal, Shutdown};
use forward_proxy::net::Listener;
use forward_proxy::observability::logging;
use forward_proxy::ProxyServer;

#[derive(Parser)]
#[command(name = "forward-proxy", version)]
#[command(about = "Forward HTTP proxy with CONNECT and WebSocket support", long_about = None)]
struct Cli {
    /// Listen address, e.g. "localhost:8080" or ":8080" for all interfaces
    listen: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listener.bind_address = listen;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "forward-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        connect_timeout_ms = config.timeouts.connect_ms,
        request_timeout_ms = config.timeouts.request_ms,
        "Configuration loaded"
    );

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server = ProxyServer::new(&config);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut server_task => {
            result??;
        }
        _ = shutdown_signal() => {
            shutdown.trigger();
            server_task.await??;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
