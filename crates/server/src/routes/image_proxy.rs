// crates/server/src/routes/image_proxy.rs
//! Image proxy for cover art that blocks hotlinking or serves over plain http.
//!
//! The dashboard renders whatever comes back as an `<img>`, so every upstream
//! failure is answered with a transparent pixel instead of an error body.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use serde::Deserialize;

use crate::error::ApiError;
use crate::link_preview::parse_http_url;
use crate::state::AppState;

/// 1x1 transparent PNG.
pub const TRANSPARENT_PNG: [u8; 68] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x04, 0x00, 0x00, 0x00, 0xb5, 0x1c, 0x0c,
    0x02, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64, 0x60, 0x00, 0x00,
    0x00, 0x06, 0x00, 0x02, 0x30, 0x81, 0xd0, 0x2f, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44,
    0xae, 0x42, 0x60, 0x82,
];

const CACHE_CONTROL: &str = "public, max-age=86400";
const FALLBACK_CACHE_CONTROL: &str = "public, max-age=300";

#[derive(Debug, Deserialize)]
pub struct ImageProxyQuery {
    pub url: Option<String>,
}

/// Content types that mean the upstream sent an error page, not an image.
fn is_error_page(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/xml" || mime.starts_with("text/")
}

fn placeholder() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, FALLBACK_CACHE_CONTROL),
        ],
        Bytes::from_static(&TRANSPARENT_PNG),
    )
        .into_response()
}

/// GET /api/image-proxy?url=
pub async fn image_proxy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ImageProxyQuery>,
) -> Result<Response, ApiError> {
    let raw = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("url is required".into()))?;
    let url = parse_http_url(&raw)
        .ok_or_else(|| ApiError::BadRequest("url must be an absolute http(s) URL".into()))?;

    let started = Instant::now();
    let response = match state
        .http
        .get(url.clone())
        .header(header::ACCEPT, "image/*")
        .timeout(state.config.image_timeout)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            crate::metrics::record_upstream("image_proxy", "error", started.elapsed());
            tracing::debug!(url = %url, error = %e, "Image fetch failed, serving placeholder");
            return Ok(placeholder());
        }
    };
    crate::metrics::record_upstream("image_proxy", response.status().as_str(), started.elapsed());

    if !response.status().is_success() {
        tracing::debug!(url = %url, status = %response.status(), "Image upstream returned non-success");
        return Ok(placeholder());
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    if is_error_page(&content_type) {
        tracing::debug!(url = %url, content_type, "Image upstream returned an error page");
        return Ok(placeholder());
    }

    let content_type = HeaderValue::from_str(&content_type)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL)),
        ],
        Body::from_stream(response.bytes_stream()),
    )
        .into_response())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/image-proxy", get(image_proxy))
}
