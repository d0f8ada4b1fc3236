//! Per-request metadata injected by the manager before dispatching into an
//! extension's router.

use std::convert::Infallible;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::Span;

/// Request-scoped context carrying the owning extension's identity and a
/// span annotated with it.
///
/// Handlers obtain it as an extractor; when a request did not pass through
/// the manager's middleware (tests, direct mounting) the extractor falls
/// back to [`RequestContext::default`] instead of failing.
#[derive(Debug, Clone)]
pub struct RequestContext {
    extension_id: Arc<str>,
    span: Span,
}

impl RequestContext {
    pub fn new(extension_id: &str) -> Self {
        let span = tracing::info_span!("extension", extension = extension_id);
        Self {
            extension_id: Arc::from(extension_id),
            span,
        }
    }

    /// Id of the extension the request was dispatched to.
    pub fn extension_id(&self) -> &str {
        &self.extension_id
    }

    /// Span annotated with the extension id; events recorded inside it carry
    /// the id without each handler repeating it.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            extension_id: Arc::from(""),
            span: Span::current(),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_exposes_extension_id() {
        let ctx = RequestContext::new("autosync");
        assert_eq!(ctx.extension_id(), "autosync");
    }

    #[test]
    fn default_context_has_empty_id() {
        let ctx = RequestContext::default();
        assert_eq!(ctx.extension_id(), "");
    }
}
