//! Serving helpers shared by extensions that expose embedded assets.

use std::fmt::Write as _;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, MethodRouter};
use sha2::{Digest, Sha256};

/// Returns a `GET` handler serving a fixed byte blob with the given content
/// type.
///
/// Responses carry `Cache-Control: no-cache` plus a content-derived `ETag`,
/// so browsers revalidate on every load but skip the body transfer while the
/// embedded asset is unchanged.
pub fn static_bytes(content_type: &'static str, body: impl Into<Bytes>) -> MethodRouter {
    let body: Bytes = body.into();
    let etag = content_etag(&body);

    get(move |headers: HeaderMap| {
        let body = body.clone();
        let etag = etag.clone();
        async move {
            let revalidated = headers
                .get(header::IF_NONE_MATCH)
                .and_then(|value| value.to_str().ok())
                == Some(etag.as_str());
            if revalidated {
                return StatusCode::NOT_MODIFIED.into_response();
            }

            (
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (header::CACHE_CONTROL, "no-cache".to_string()),
                    (header::ETAG, etag),
                ],
                body,
            )
                .into_response()
        }
    })
}

fn content_etag(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    let mut tag = String::with_capacity(34);
    tag.push('"');
    for byte in &digest[..16] {
        let _ = write!(tag, "{byte:02x}");
    }
    tag.push('"');
    tag
}
