//! Extracss extension: extra stylesheets layered onto the game shell.
//!
//! Serves a set of embedded `.css` files plus a generated `/inject.js`
//! that appends one `<link>` per stylesheet to the document head.

use async_trait::async_trait;
use axum::Router;
use tokio_util::sync::CancellationToken;

use extension_system::serve::static_bytes;
use extension_system::{
    BuiltExtension, Extension, ExtensionError, ExtensionInfo, HttpCapability,
};

/// Stable id the extension is registered and mounted under.
pub const ID: &str = "extracss";

/// Embedded stylesheets, served verbatim under the extension mount.
const CSS_FILES: &[(&str, &[u8])] = &[
    ("fonts.css", include_bytes!("../assets/fonts.css")),
    ("ui-tweaks.css", include_bytes!("../assets/ui-tweaks.css")),
];

/// Descriptor for the registry assembled at process entry.
pub fn info() -> ExtensionInfo {
    ExtensionInfo {
        id: ID,
        build: Box::new(build),
    }
}

struct ExtraCssExtension;

#[async_trait]
impl Extension for ExtraCssExtension {
    async fn start(&self, _shutdown: CancellationToken) -> Result<(), ExtensionError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ExtensionError> {
        Ok(())
    }
}

// The config payload carries no fields; its presence alone enables the
// extension.
fn build(_cfg: serde_json::Value) -> Result<BuiltExtension, ExtensionError> {
    let mut router = Router::new().route(
        "/inject.js",
        static_bytes("text/javascript", injector_script()?.into_bytes()),
    );
    for (name, bytes) in CSS_FILES {
        router = router.route(&format!("/{name}"), static_bytes("text/css", *bytes));
    }

    Ok(BuiltExtension::new(ExtraCssExtension).with_http(HttpCapability::with_scripts(
        router,
        vec!["/inject.js".to_string()],
    )))
}

/// Script that links every embedded stylesheet into the document head.
fn injector_script() -> Result<String, ExtensionError> {
    let paths: Vec<String> = CSS_FILES
        .iter()
        .map(|(name, _)| format!("/x/{ID}/{name}"))
        .collect();
    let encoded = serde_json::to_string(&paths)
        .map_err(|err| ExtensionError::Runtime(format!("encoding css paths: {err}")))?;

    Ok(format!(
        "const cssPaths = {encoded};\n\
         for (const url of cssPaths) {{\n\
           const link = document.createElement(\"link\");\n\
           link.rel = \"stylesheet\";\n\
           link.href = url;\n\
           document.head.appendChild(link);\n\
         }}\n"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn injector_lists_every_stylesheet() {
        let script = injector_script().unwrap();
        assert!(script.contains("/x/extracss/fonts.css"));
        assert!(script.contains("/x/extracss/ui-tweaks.css"));
    }

    #[tokio::test]
    async fn serves_stylesheets_and_injector() {
        let built = build(serde_json::json!({})).unwrap();
        let app = built.http.unwrap().router;

        for path in ["/inject.js", "/fonts.css", "/ui-tweaks.css"] {
            let response = app
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{path}");
        }
    }

    #[test]
    fn declares_the_injector_script() {
        let built = build(serde_json::json!({})).unwrap();
        assert_eq!(built.http.unwrap().script_paths, vec!["/inject.js"]);
    }
}
