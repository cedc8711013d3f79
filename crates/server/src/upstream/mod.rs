// crates/server/src/upstream/mod.rs
//! Clients for the managed services the dashboard reads from and writes to.

pub mod google_calendar;
pub mod notion;
pub mod supabase;

use std::time::Instant;

use serde::de::DeserializeOwned;
use thiserror::Error;

pub use google_calendar::GoogleCalendarClient;
pub use notion::NotionClient;
pub use supabase::SupabaseClient;

/// PostgREST code for "the result contains 0 rows" on a single-object request.
pub const PGRST_NO_ROWS: &str = "PGRST116";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },
}

impl UpstreamError {
    pub fn service(&self) -> &'static str {
        match self {
            UpstreamError::Http { service, .. }
            | UpstreamError::Status { service, .. }
            | UpstreamError::Decode { service, .. }
            | UpstreamError::NotConfigured { service } => service,
        }
    }

    /// PostgREST reported that a single-row query matched nothing.
    pub fn is_no_rows(&self) -> bool {
        let UpstreamError::Status { body, .. } = self else {
            return false;
        };
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("code").and_then(|c| c.as_str()).map(|c| c == PGRST_NO_ROWS))
            .unwrap_or(false)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::Status { status: 404 | 410, .. })
    }
}

/// Send `request`, record metrics, and turn non-2xx responses into
/// [`UpstreamError::Status`].
pub(crate) async fn send(
    service: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, UpstreamError> {
    let start = Instant::now();
    let result = request.send().await;
    let elapsed = start.elapsed();

    let response = match result {
        Ok(r) => r,
        Err(source) => {
            crate::metrics::record_upstream(service, "error", elapsed);
            return Err(UpstreamError::Http { service, source });
        }
    };

    let status = response.status();
    crate::metrics::record_upstream(service, status.as_str(), elapsed);
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(UpstreamError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}

/// Decode a JSON body.
pub(crate) async fn decode<T: DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T, UpstreamError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|source| UpstreamError::Http { service, source })?;
    serde_json::from_slice(&bytes).map_err(|e| UpstreamError::Decode {
        service,
        message: e.to_string(),
    })
}
