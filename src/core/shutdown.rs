use tokio::signal;

/// Completes once the process receives Ctrl+C or, on unix, SIGTERM.
#[cfg(unix)]
pub(crate) async fn shutdown_signal() {
    use signal::unix::{signal as unix_signal, SignalKind};

    let mut sigterm = match unix_signal(SignalKind::terminate()) {
        Ok(stream) => Some(stream),
        Err(err) => {
            tracing::error!(error = %err, "failed to install SIGTERM handler");
            None
        }
    };

    let sigterm_recv = async {
        match sigterm.as_mut() {
            Some(stream) => {
                stream.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(err) = result {
                tracing::error!(error = %err, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
        _ = sigterm_recv => {}
    }

    tracing::info!("shutdown signal received, draining");
}

#[cfg(not(unix))]
pub(crate) async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }

    tracing::info!("shutdown signal received, draining");
}
