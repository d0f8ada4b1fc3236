//! Entry point for the gamedock companion server.
//!
//! Composes the extension registry explicitly, loads the JSON config,
//! builds the extensions manager and the host router, and serves until a
//! termination signal arrives.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::extract::Request;
use axum::ServiceExt;
use tokio_util::sync::CancellationToken;
use tower::Layer;
use tower_http::normalize_path::NormalizePathLayer;
use tracing::{error, info, warn};

use extension_system::{ExtensionRegistry, ExtensionsManager};

use crate::cli::CliArgs;
use crate::config::Config;

mod browser;
mod cli;
mod config;
mod host;
mod logging;
mod signals;

/// All known extensions, in the order their scripts load in the game shell.
fn builtin_registry() -> ExtensionRegistry {
    ExtensionRegistry::new()
        .register(extension_autosync::info())
        .register(extension_extracss::info())
        .register(extension_reminder::info())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let args = CliArgs::parse();

    if let Err(err) = logging::setup_logging(args.verbose) {
        eprintln!("failed to initialize logging: {err:#}");
        std::process::exit(1);
    }

    if let Err(err) = run(args).await {
        error!("error occurred: {err:#}");
        std::process::exit(1);
    }
}

async fn run(args: CliArgs) -> Result<()> {
    let listen_addr: SocketAddr = args
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", args.listen_addr))?;

    let config = Config::load_from_file(&args.config_path).await?;

    let registry = builtin_registry();
    let manager = ExtensionsManager::new(&registry, &config.extensions)
        .await
        .context("creating extensions manager")?;
    info!(extensions = ?manager.extension_ids(), "configured extensions");

    let app = host::build_host(&config.game_path, &manager).context("creating host server")?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = signals::wait_for_signal().await {
                error!("signal handler failed: {err:#}");
            }
            shutdown.cancel();
        });
    }

    manager
        .start(&shutdown)
        .await
        .context("starting extensions")?;

    if args.open_browser {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = browser::wait_and_open(shutdown, listen_addr).await {
                warn!("failed to open browser: {err:#}");
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("binding {listen_addr}"))?;
    info!(%listen_addr, "listening");

    // Trailing-slash normalization must run before routing, so the layer
    // wraps the finished router instead of going through Router::layer.
    let app = NormalizePathLayer::trim_trailing_slash().layer(app);
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .context("serving HTTP")?;

    manager.stop().await.context("stopping extensions")?;
    info!("shutdown complete");
    Ok(())
}
