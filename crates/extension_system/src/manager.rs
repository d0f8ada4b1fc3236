//! Orchestration of configured extensions: construction, concurrent
//! lifecycle, HTTP mounting, and script aggregation.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::routing::get;
use axum::{Json, Router};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

use crate::context::RequestContext;
use crate::error::ManagerError;
use crate::extension::{Extension, ExtensionInfo, ExtensionRegistry, HttpCapability};

/// Prefix under which every extension's HTTP surface is mounted.
const MOUNT_PREFIX: &str = "/x";

/// Mapping of extension id to its opaque config payload. Absence of an id
/// means the extension is not instantiated.
pub type ExtensionConfigs = HashMap<String, serde_json::Value>;

struct ManagedExtension {
    id: &'static str,
    extension: Arc<dyn Extension>,
    http: Option<HttpCapability>,
}

/// Owns the configured extensions for the process lifetime and drives their
/// lifecycle.
pub struct ExtensionsManager {
    extensions: Vec<ManagedExtension>,
}

impl std::fmt::Debug for ExtensionsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionsManager")
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

impl ExtensionsManager {
    /// Builds a manager from a registry, instantiating only the extensions
    /// that have a config entry.
    pub async fn new(
        registry: &ExtensionRegistry,
        configs: &ExtensionConfigs,
    ) -> Result<Self, ManagerError> {
        Self::from_extensions(registry.infos(), configs).await
    }

    /// Builds a manager from an explicit descriptor list (the registry is a
    /// thin wrapper over this; tests use it directly).
    ///
    /// Construction is all-or-nothing: if any constructor fails, the first
    /// error is kept, the remaining descriptors are still attempted, and
    /// every successfully built extension gets a best-effort `stop` before
    /// the error is returned.
    pub async fn from_extensions(
        infos: &[ExtensionInfo],
        configs: &ExtensionConfigs,
    ) -> Result<Self, ManagerError> {
        let mut first_err: Option<ManagerError> = None;
        let mut extensions = Vec::with_capacity(infos.len());

        for info in infos {
            let Some(config) = configs.get(info.id) else {
                debug!(
                    extension = info.id,
                    "skipping extension since no config was provided"
                );
                continue;
            };

            match (info.build)(config.clone()) {
                Ok(built) => extensions.push(ManagedExtension {
                    id: info.id,
                    extension: built.extension,
                    http: built.http,
                }),
                Err(source) => {
                    if first_err.is_none() {
                        first_err = Some(ManagerError::Construct {
                            id: info.id.to_string(),
                            source,
                        });
                    }
                }
            }
        }

        if let Some(err) = first_err {
            // Unwind: stop whatever was built, dropping stop errors so the
            // constructor failure is what the caller sees.
            for ext in &extensions {
                if let Err(stop_err) = ext.extension.stop().await {
                    debug!(
                        extension = ext.id,
                        error = %stop_err,
                        "ignoring stop failure during construction unwind"
                    );
                }
            }
            return Err(err);
        }

        Ok(Self { extensions })
    }

    /// Starts every managed extension concurrently and waits for all of
    /// them.
    ///
    /// Each start call receives a token shared by the whole group, derived
    /// from the process shutdown token. On the first failure the group token
    /// is cancelled so siblings can bail out, remaining tasks are still
    /// awaited, and the first error is returned.
    pub async fn start(&self, shutdown: &CancellationToken) -> Result<(), ManagerError> {
        let group = shutdown.child_token();
        let mut tasks = JoinSet::new();

        for ext in &self.extensions {
            let id = ext.id;
            let extension = ext.extension.clone();
            let token = group.clone();
            tasks.spawn(async move {
                extension
                    .start(token)
                    .await
                    .map_err(|source| ManagerError::Start {
                        id: id.to_string(),
                        source,
                    })
            });
        }

        let mut first_err = None;
        while let Some(joined) = tasks.join_next().await {
            let result =
                joined.unwrap_or_else(|err| Err(ManagerError::TaskAborted(err.to_string())));
            if let Err(err) = result {
                if first_err.is_none() {
                    group.cancel();
                    first_err = Some(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Stops every managed extension concurrently, best-effort.
    ///
    /// Every extension gets a stop attempt regardless of earlier failures;
    /// the first error encountered is returned.
    pub async fn stop(&self) -> Result<(), ManagerError> {
        let mut tasks = JoinSet::new();

        for ext in &self.extensions {
            let id = ext.id;
            let extension = ext.extension.clone();
            tasks.spawn(async move {
                extension.stop().await.map_err(|source| ManagerError::Stop {
                    id: id.to_string(),
                    source,
                })
            });
        }

        let mut first_err = None;
        while let Some(joined) = tasks.join_next().await {
            let result =
                joined.unwrap_or_else(|err| Err(ManagerError::TaskAborted(err.to_string())));
            if let Err(err) = result {
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Mounts every HTTP-capable extension under `/x/<id>` and adds the
    /// `GET /x` discovery route listing active extension ids in
    /// registration order.
    ///
    /// Each mounted router is wrapped so requests carry a [`RequestContext`]
    /// and run inside a span annotated with the extension id.
    pub fn bind_router(&self, mut router: Router) -> Router {
        for ext in &self.extensions {
            let Some(http) = &ext.http else { continue };

            let id = ext.id;
            let tagged = http
                .router
                .clone()
                .layer(middleware::from_fn(move |mut req: Request, next: Next| {
                    async move {
                        let ctx = RequestContext::new(id);
                        let span = ctx.span().clone();
                        req.extensions_mut().insert(ctx);
                        next.run(req).instrument(span).await
                    }
                }));

            router = router.nest(&format!("{MOUNT_PREFIX}/{id}"), tagged);
        }

        let ids = self.extension_ids();
        router.route(MOUNT_PREFIX, get(move || async move { Json(ids) }))
    }

    /// Absolute paths of every script the host page should load, in
    /// registration order. Empty if no extension declares scripts.
    pub fn script_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for ext in &self.extensions {
            let Some(http) = &ext.http else { continue };
            for script in &http.script_paths {
                let script = script.trim_start_matches('/');
                paths.push(format!("{MOUNT_PREFIX}/{}/{script}", ext.id));
            }
        }
        paths
    }

    /// Ids of the active extensions, in registration order.
    pub fn extension_ids(&self) -> Vec<&'static str> {
        self.extensions.iter().map(|ext| ext.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtensionError;
    use crate::extension::BuiltExtension;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    #[derive(Default)]
    struct Flags {
        started: AtomicBool,
        stopped: AtomicBool,
    }

    struct StubExtension {
        flags: Arc<Flags>,
        fail_start: bool,
        fail_stop: bool,
        finish_on_cancel: bool,
    }

    #[async_trait]
    impl Extension for StubExtension {
        async fn start(&self, shutdown: CancellationToken) -> Result<(), ExtensionError> {
            if self.fail_start {
                return Err(ExtensionError::Runtime("start refused".into()));
            }
            if self.finish_on_cancel {
                shutdown.cancelled().await;
            }
            self.flags.started.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<(), ExtensionError> {
            self.flags.stopped.store(true, Ordering::SeqCst);
            if self.fail_stop {
                return Err(ExtensionError::Runtime("stop refused".into()));
            }
            Ok(())
        }
    }

    fn stub_info(id: &'static str, flags: Arc<Flags>) -> ExtensionInfo {
        ExtensionInfo {
            id,
            build: Box::new(move |_cfg| {
                Ok(BuiltExtension::new(StubExtension {
                    flags: flags.clone(),
                    fail_start: false,
                    fail_stop: false,
                    finish_on_cancel: false,
                }))
            }),
        }
    }

    fn configs_for(ids: &[&str]) -> ExtensionConfigs {
        ids.iter()
            .map(|id| (id.to_string(), serde_json::json!({})))
            .collect()
    }

    #[tokio::test]
    async fn constructs_only_configured_extensions_in_order() {
        let infos = vec![
            stub_info("alpha", Arc::default()),
            stub_info("beta", Arc::default()),
            stub_info("gamma", Arc::default()),
        ];

        // Insertion order of the config map must not matter.
        let configs = configs_for(&["gamma", "alpha"]);

        let manager = ExtensionsManager::from_extensions(&infos, &configs)
            .await
            .unwrap();
        assert_eq!(manager.extension_ids(), vec!["alpha", "gamma"]);
    }

    #[tokio::test]
    async fn constructor_failure_stops_already_built_extensions() {
        let first = Arc::new(Flags::default());
        let third = Arc::new(Flags::default());

        let infos = vec![
            stub_info("first", first.clone()),
            ExtensionInfo {
                id: "broken",
                build: Box::new(|_cfg| Err(ExtensionError::Config("bad payload".into()))),
            },
            stub_info("third", third.clone()),
        ];

        let err = ExtensionsManager::from_extensions(&infos, &configs_for(&["first", "broken", "third"]))
            .await
            .unwrap_err();

        assert_eq!(err.extension_id(), Some("broken"));
        assert!(first.stopped.load(Ordering::SeqCst));
        assert!(third.stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn start_runs_every_extension() {
        let a = Arc::new(Flags::default());
        let b = Arc::new(Flags::default());
        let infos = vec![stub_info("a", a.clone()), stub_info("b", b.clone())];

        let manager = ExtensionsManager::from_extensions(&infos, &configs_for(&["a", "b"]))
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        manager.start(&shutdown).await.unwrap();
        assert!(a.started.load(Ordering::SeqCst));
        assert!(b.started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn start_failure_cancels_the_group() {
        let waiting = Arc::new(Flags::default());
        let infos = vec![
            ExtensionInfo {
                id: "failing",
                build: Box::new(|_cfg| {
                    Ok(BuiltExtension::new(StubExtension {
                        flags: Arc::default(),
                        fail_start: true,
                        fail_stop: false,
                        finish_on_cancel: false,
                    }))
                }),
            },
            ExtensionInfo {
                id: "waiting",
                build: Box::new({
                    let waiting = waiting.clone();
                    move |_cfg| {
                        Ok(BuiltExtension::new(StubExtension {
                            flags: waiting.clone(),
                            fail_start: false,
                            fail_stop: false,
                            // Blocks until the group token is cancelled; the
                            // test would hang if cancellation did not
                            // propagate on the sibling's failure.
                            finish_on_cancel: true,
                        }))
                    }
                }),
            },
        ];

        let manager =
            ExtensionsManager::from_extensions(&infos, &configs_for(&["failing", "waiting"]))
                .await
                .unwrap();

        let shutdown = CancellationToken::new();
        let err = manager.start(&shutdown).await.unwrap_err();
        assert_eq!(err.extension_id(), Some("failing"));
        assert!(waiting.started.load(Ordering::SeqCst));
        // The process-wide token stays usable for the next startup attempt.
        assert!(!shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn stop_attempts_every_extension_and_reports_first_error() {
        let healthy = Arc::new(Flags::default());
        let failing = Arc::new(Flags::default());
        let infos = vec![
            ExtensionInfo {
                id: "failing",
                build: Box::new({
                    let failing = failing.clone();
                    move |_cfg| {
                        Ok(BuiltExtension::new(StubExtension {
                            flags: failing.clone(),
                            fail_start: false,
                            fail_stop: true,
                            finish_on_cancel: false,
                        }))
                    }
                }),
            },
            stub_info("healthy", healthy.clone()),
        ];

        let manager =
            ExtensionsManager::from_extensions(&infos, &configs_for(&["failing", "healthy"]))
                .await
                .unwrap();

        let err = manager.stop().await.unwrap_err();
        assert_eq!(err.extension_id(), Some("failing"));
        assert!(healthy.stopped.load(Ordering::SeqCst));
        assert!(failing.stopped.load(Ordering::SeqCst));
    }

    fn http_info(id: &'static str, scripts: &[&str]) -> ExtensionInfo {
        let scripts: Vec<String> = scripts.iter().map(|s| s.to_string()).collect();
        ExtensionInfo {
            id,
            build: Box::new(move |_cfg| {
                let router = Router::new().route(
                    "/whoami",
                    get(|ctx: RequestContext| async move { ctx.extension_id().to_string() }),
                );
                Ok(BuiltExtension::new(StubExtension {
                    flags: Arc::default(),
                    fail_start: false,
                    fail_stop: false,
                    finish_on_cancel: false,
                })
                .with_http(HttpCapability::with_scripts(router, scripts.clone())))
            }),
        }
    }

    #[tokio::test]
    async fn bind_router_mounts_extensions_and_discovery_route() {
        let infos = vec![http_info("echo", &[])];
        let manager = ExtensionsManager::from_extensions(&infos, &configs_for(&["echo"]))
            .await
            .unwrap();

        let app = manager.bind_router(Router::new());

        let discovery = app
            .clone()
            .oneshot(HttpRequest::get("/x").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(discovery.status(), StatusCode::OK);
        let body = axum::body::to_bytes(discovery.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], br#"["echo"]"#);

        // The mounted handler sees its own id through the request context.
        let whoami = app
            .oneshot(HttpRequest::get("/x/echo/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(whoami.status(), StatusCode::OK);
        let body = axum::body::to_bytes(whoami.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"echo");
    }

    #[tokio::test]
    async fn script_paths_follow_registration_order() {
        let infos = vec![
            http_info("second", &["/b.js"]),
            http_info("first", &["a.js", "/extra/c.js"]),
        ];

        // Config map insertion order is deliberately reversed.
        let mut configs = ExtensionConfigs::new();
        configs.insert("first".into(), serde_json::json!({}));
        configs.insert("second".into(), serde_json::json!({}));

        let manager = ExtensionsManager::from_extensions(&infos, &configs)
            .await
            .unwrap();

        assert_eq!(
            manager.script_paths(),
            vec!["/x/second/b.js", "/x/first/a.js", "/x/first/extra/c.js"]
        );
    }
}
