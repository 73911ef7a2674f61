use tokio::signal;

#[derive(Debug, thiserror::Error)]
pub enum ShutdownSignalError {
    #[error("failed to install Ctrl+C handler: {0}")]
    CtrlC(std::io::Error),
    #[cfg(unix)]
    #[error("failed to install SIGTERM handler: {0}")]
    Sigterm(std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Signal {
    Interrupt,
    Terminate,
}

/// Resolves with whichever of Ctrl-C or SIGTERM arrives first.
pub async fn shutdown_signal() -> Result<Signal, ShutdownSignalError> {
    let interrupt = async {
        signal::ctrl_c()
            .await
            .map(|()| Signal::Interrupt)
            .map_err(ShutdownSignalError::CtrlC)
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(ShutdownSignalError::Sigterm)?;
        sigterm.recv().await;
        Ok(Signal::Terminate)
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<Signal, ShutdownSignalError>>();

    tokio::select! {
        result = interrupt => result,
        result = terminate => result,
    }
}
