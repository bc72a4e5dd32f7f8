//! Waits for the root cancellation signal: `SIGINT` (Ctrl+C) or, on Unix,
//! `SIGTERM` (spec.md §5: "all long-lived tasks respect a root cancellation
//! signal").

/// Resolve once either signal arrives.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
