//! Browser-launch convenience: wait until the server accepts connections,
//! then open the system browser on it.

use std::net::SocketAddr;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls the listen address until a TCP connect succeeds, then opens the
/// browser. Bails out silently when shutdown is requested first.
pub async fn wait_and_open(shutdown: CancellationToken, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{addr}");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            connected = TcpStream::connect(addr) => {
                match connected {
                    Ok(_) => break,
                    Err(err) => {
                        debug!(error = %err, url, "still waiting for server to start");
                    }
                }
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    debug!(url, "server has started, opening browser");
    open_url(&url)
}

fn open_url(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    let mut command = Command::new("open");

    #[cfg(windows)]
    let mut command = {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]);
        command
    };

    #[cfg(all(unix, not(target_os = "macos")))]
    let mut command = Command::new("xdg-open");

    command.arg(url).spawn().context("spawning browser opener")?;
    Ok(())
}
