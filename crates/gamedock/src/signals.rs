//! Signal handling for graceful server shutdown.

use anyhow::Result;
use tokio::signal;
use tracing::info;

/// Waits for a termination signal (SIGINT/SIGTERM on Unix, Ctrl+C on
/// Windows) and returns once one is received.
pub async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }
    }

    #[cfg(windows)]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
