//! # Autosync Extension
//!
//! Cross-device save synchronization for the gamedock companion server.
//!
//! The extension persists exactly one save record per installation (an
//! opaque blob plus a client-supplied logical timestamp) and exposes a
//! two-endpoint merge protocol under its mount:
//!
//! * `GET /merge` returns the current server record, empty if none exists
//!   yet.
//! * `POST /merge` performs a last-writer-wins merge: the greater timestamp
//!   wins, and a stale client receives `409` with the full server record to
//!   adopt.
//!
//! Every read-then-write sequence runs under a cross-process advisory file
//! lock scoped to the configured save directory, so concurrent requests and
//! separate server processes never interleave their critical sections.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use extension_system::serve::static_bytes;
use extension_system::{
    BuiltExtension, Extension, ExtensionError, ExtensionInfo, HttpCapability, RequestContext,
};

pub use store::{SaveRecord, SaveStore, StoreError};

mod lock;
mod store;

/// Stable id the extension is registered and mounted under.
pub const ID: &str = "autosync";

/// Client-side sync script injected into the game shell.
const AUTOSYNC_JS: &[u8] = include_bytes!("../assets/autosync.js");

/// Descriptor for the registry assembled at process entry.
pub fn info() -> ExtensionInfo {
    ExtensionInfo {
        id: ID,
        build: Box::new(build),
    }
}

/// Configuration payload for the autosync extension.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Directory holding the save file and its lock. Defaults to
    /// `gamedock/autosync` inside the per-user config directory.
    #[serde(default)]
    pub save_path: Option<PathBuf>,
}

struct AutosyncExtension;

#[async_trait]
impl Extension for AutosyncExtension {
    async fn start(&self, _shutdown: CancellationToken) -> Result<(), ExtensionError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ExtensionError> {
        Ok(())
    }
}

fn build(cfg: serde_json::Value) -> Result<BuiltExtension, ExtensionError> {
    let cfg: Config =
        serde_json::from_value(cfg).map_err(|err| ExtensionError::Config(err.to_string()))?;

    let save_dir = match cfg.save_path {
        Some(path) => path,
        None => default_save_dir()?,
    };
    std::fs::create_dir_all(&save_dir)?;

    let store = Arc::new(SaveStore::new(&save_dir));
    Ok(BuiltExtension::new(AutosyncExtension).with_http(HttpCapability::with_scripts(
        routes(store),
        vec!["/autosync.js".to_string()],
    )))
}

/// Routes served under the extension mount.
fn routes(store: Arc<SaveStore>) -> Router {
    Router::new()
        .route("/merge", get(read_save).post(merge_save))
        .with_state(store)
        .route("/autosync.js", static_bytes("text/javascript", AUTOSYNC_JS))
}

fn default_save_dir() -> Result<PathBuf, ExtensionError> {
    let base = user_config_dir().ok_or_else(|| {
        ExtensionError::Runtime("could not determine the user config directory".into())
    })?;
    Ok(base.join("gamedock").join("autosync"))
}

#[cfg(target_os = "macos")]
fn user_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join("Library/Application Support"))
}

#[cfg(windows)]
fn user_config_dir() -> Option<PathBuf> {
    std::env::var_os("APPDATA").map(PathBuf::from)
}

#[cfg(all(unix, not(target_os = "macos")))]
fn user_config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Wire envelope for merge outcomes.
#[derive(Debug, Serialize)]
#[serde(tag = "result", content = "data", rename_all = "snake_case")]
enum MergeResponse {
    Ok { changed: bool },
    Outdated(SaveRecord),
    Error { error: String },
}

fn envelope(status: StatusCode, response: MergeResponse) -> Response {
    (status, Json(response)).into_response()
}

fn merge_error(status: StatusCode, err: impl std::fmt::Display) -> Response {
    envelope(
        status,
        MergeResponse::Error {
            error: err.to_string(),
        },
    )
}

/// `GET /merge`: the current server record, synthesized empty when no save
/// exists yet. Nothing is created on disk.
async fn read_save(State(store): State<Arc<SaveStore>>) -> Response {
    let guard = match store.acquire().await {
        Ok(guard) => guard,
        Err(err) => return merge_error(StatusCode::INTERNAL_SERVER_ERROR, err),
    };

    match store.read(&guard) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => merge_error(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

/// `POST /merge`: last-writer-wins merge of the client record against the
/// persisted one.
///
/// Timestamps are client-supplied logical clocks: the strictly greater side
/// wins, equality means already consistent, and ties between racing clients
/// deliberately fall to whichever acquires the lock first.
async fn merge_save(
    ctx: RequestContext,
    State(store): State<Arc<SaveStore>>,
    body: Bytes,
) -> Response {
    // Bad input is rejected before the lock is ever taken.
    let client: SaveRecord = match serde_json::from_slice(&body) {
        Ok(record) => record,
        Err(err) => {
            return merge_error(
                StatusCode::BAD_REQUEST,
                format!("decoding save record: {err}"),
            )
        }
    };

    let guard = match store.acquire().await {
        Ok(guard) => guard,
        Err(err) => return merge_error(StatusCode::INTERNAL_SERVER_ERROR, err),
    };
    let server = match store.read(&guard) {
        Ok(record) => record,
        Err(err) => return merge_error(StatusCode::INTERNAL_SERVER_ERROR, err),
    };

    debug!(
        parent: ctx.span(),
        server_date = server.date,
        client_date = client.date,
        "merging save data"
    );

    if server.date > client.date {
        // Client is stale; hand it the full server record to adopt.
        return envelope(StatusCode::CONFLICT, MergeResponse::Outdated(server));
    }

    let changed = client.date > server.date;
    if changed {
        if let Err(err) = store.write(&guard, &client) {
            return merge_error(StatusCode::INTERNAL_SERVER_ERROR, err);
        }
    }

    envelope(StatusCode::OK, MergeResponse::Ok { changed })
}
