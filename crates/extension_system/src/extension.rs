//! The extension contract: lifecycle trait, capability handles, and the
//! registry of known extension constructors.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::error::ExtensionError;

/// Lifecycle contract every extension implements.
///
/// Both methods are called exactly once by the manager: `start` after
/// construction succeeds for the whole set, `stop` at shutdown (or during
/// the construction unwind when a later constructor fails).
#[async_trait]
pub trait Extension: Send + Sync {
    /// Starts the extension. May block until the extension is ready, or
    /// return immediately when there is no background work. The token is
    /// cancelled on process shutdown (or when a sibling extension fails to
    /// start); background tasks must honor it.
    async fn start(&self, shutdown: CancellationToken) -> Result<(), ExtensionError>;

    /// Stops the extension and releases its resources.
    async fn stop(&self) -> Result<(), ExtensionError>;
}

/// HTTP surface of an extension, resolved once at construction time.
///
/// `script_paths` are relative to the extension's mount prefix and are only
/// meaningful together with a router: a script-injectable extension is by
/// definition HTTP-mountable, which is why the paths live inside this
/// capability rather than on the extension itself.
pub struct HttpCapability {
    /// Router mounted by the manager under `/x/<id>`.
    pub router: Router,
    /// Script paths the game shell loads as module scripts, in order.
    pub script_paths: Vec<String>,
}

impl HttpCapability {
    /// An HTTP surface with no injected scripts.
    pub fn routes(router: Router) -> Self {
        Self {
            router,
            script_paths: Vec::new(),
        }
    }

    /// An HTTP surface whose listed paths are injected into the game shell.
    pub fn with_scripts(router: Router, script_paths: Vec<String>) -> Self {
        Self {
            router,
            script_paths,
        }
    }
}

/// A fully constructed extension together with its capability handles.
pub struct BuiltExtension {
    pub extension: Arc<dyn Extension>,
    pub http: Option<HttpCapability>,
}

impl std::fmt::Debug for BuiltExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltExtension")
            .field("http", &self.http.as_ref().map(|_| "<http>"))
            .finish_non_exhaustive()
    }
}

impl BuiltExtension {
    pub fn new(extension: impl Extension + 'static) -> Self {
        Self {
            extension: Arc::new(extension),
            http: None,
        }
    }

    pub fn with_http(mut self, http: HttpCapability) -> Self {
        self.http = Some(http);
        self
    }
}

/// Constructor invoked with the extension's opaque config payload.
pub type BuildFn =
    Box<dyn Fn(serde_json::Value) -> Result<BuiltExtension, ExtensionError> + Send + Sync>;

/// Descriptor for a known extension: a stable id plus its constructor.
pub struct ExtensionInfo {
    pub id: &'static str,
    pub build: BuildFn,
}

/// Insertion-ordered collection of extension descriptors.
///
/// Built explicitly at process entry and passed to the manager; there is no
/// process-global mutable registry. Order of registration determines the
/// order of construction, startup, and script aggregation.
#[derive(Default)]
pub struct ExtensionRegistry {
    infos: Vec<ExtensionInfo>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a descriptor, preserving registration order.
    pub fn register(mut self, info: ExtensionInfo) -> Self {
        self.infos.push(info);
        self
    }

    pub fn infos(&self) -> &[ExtensionInfo] {
        &self.infos
    }
}
