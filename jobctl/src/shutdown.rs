//! Interrupt handling for long waits and tails.

use tokio_util::sync::CancellationToken;

/// Cancel the returned token on Ctrl-C or SIGTERM.
///
/// Cancellation only abandons client-side waits; jobs already submitted or
/// asked to stop are left as they are.
#[cfg(unix)]
pub fn install_interrupt_handler() -> std::io::Result<CancellationToken> {
    use tokio::signal::unix::{signal, SignalKind};

    let token = CancellationToken::new();
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, abandoning wait"),
            _ = sigint.recv() => tracing::info!("Received SIGINT, abandoning wait"),
        }
        cancel.cancel();
    });

    Ok(token)
}

#[cfg(not(unix))]
pub fn install_interrupt_handler() -> std::io::Result<CancellationToken> {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, abandoning wait");
            cancel.cancel();
        }
    });
    Ok(token)
}
