//! Host router composition: the patched game HTML shell, the static asset
//! tree, and the extension routes, merged into one HTTP surface.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::debug;

use extension_system::serve::static_bytes;
use extension_system::ExtensionsManager;

/// Builds the complete host router for the given game directory.
pub fn build_host(game_path: &Path, manager: &ExtensionsManager) -> Result<Router> {
    let html_file = find_game_html(game_path)?;
    debug!(file = %html_file.display(), "found game HTML file");

    let html = std::fs::read(&html_file)
        .with_context(|| format!("reading game HTML file {}", html_file.display()))?;
    let patched = patch_game_html(html, &manager.script_paths());

    let router = manager.bind_router(Router::new());
    Ok(router
        .route("/", static_bytes("text/html", patched))
        .fallback_service(ServeDir::new(game_path))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http()))
}

/// The game directory must contain exactly one HTML shell.
fn find_game_html(game_path: &Path) -> Result<PathBuf> {
    let mut html_files = Vec::new();
    for entry in std::fs::read_dir(game_path)
        .with_context(|| format!("reading game path {}", game_path.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "html") {
            html_files.push(path);
        }
    }
    html_files.sort();

    match html_files.len() {
        1 => Ok(html_files.remove(0)),
        count => bail!("found {count} HTML files in game path, expected exactly 1"),
    }
}

/// Inserts one module-script tag per path immediately before the first
/// `</head>`. Without a head element the shell is served unmodified.
fn patch_game_html(html: Vec<u8>, scripts: &[String]) -> Vec<u8> {
    let mut tags = String::new();
    for script in scripts {
        debug!(script, "patching game HTML with script tag");
        let _ = write!(tags, r#"<script src="{script}" type="module"></script>"#);
    }

    let Some(pos) = find_subslice(&html, b"</head>") else {
        return html;
    };

    let mut patched = Vec::with_capacity(html.len() + tags.len());
    patched.extend_from_slice(&html[..pos]);
    patched.extend_from_slice(tags.as_bytes());
    patched.extend_from_slice(&html[pos..]);
    patched
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
