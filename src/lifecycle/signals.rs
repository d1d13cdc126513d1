//! OS signal handling.

/// Resolves when the process receives Ctrl+C (SIGINT).
///
/// If the handler cannot be installed the error is logged and the future
/// never resolves, leaving the proxy running until it is killed.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C"),
        Err(err) => {
            tracing::error!(error = %err, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
