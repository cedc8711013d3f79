//! API route handlers for the lifedash server.

pub mod calendar;
pub mod finance;
pub mod habits;
pub mod health;
pub mod image_proxy;
pub mod media;
pub mod metrics;
pub mod preferences;
pub mod tracking;
pub mod youtube;

use std::sync::Arc;

use axum::{middleware, Router};

use crate::auth::require_bearer;
use crate::state::AppState;

/// Create the combined router.
///
/// Routes:
/// - GET /api/health - Health check (never behind the token)
/// - GET /api/media, GET /api/media/board, POST /api/media/sync,
///   POST /api/media/create-from-link, PATCH|DELETE /api/media/{id}
/// - GET|POST /api/notion/habits, POST /api/notion/habits/status,
///   POST /api/notion/habits/color, PUT /api/notion/habits/update,
///   POST /api/notion/habits/create, GET /api/notion/habits/heatmap
/// - GET /api/youtube/recently-watched
/// - GET /api/image-proxy (never behind the token)
/// - GET|POST /api/google-calendar/events, PATCH|DELETE /api/google-calendar/events/{id}
/// - GET|POST /api/events/{id}/people, DELETE /api/events/{id}/people/{person_id}
/// - GET /api/tracking, GET /api/tracking/{id}/trend
/// - GET /api/finance/assets, GET /api/finance/allocation
/// - GET|PUT /api/preferences, POST /api/preferences/collapsed
/// - GET /metrics - Prometheus metrics (outside /api)
pub fn api_routes(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .nest("/api", media::router())
        .nest("/api", habits::router())
        .nest("/api", youtube::router())
        .nest("/api", calendar::router())
        .nest("/api", tracking::router())
        .nest("/api", finance::router())
        .nest("/api", preferences::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    // Loaded by <img> tags, which cannot send an Authorization header.
    Router::new()
        .nest("/api", health::router())
        .nest("/api", image_proxy::router())
        .merge(protected)
        .merge(metrics::router())
        .with_state(state)
}

/// Shared helpers for route tests.
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use lifedash_core::MemoryPreferenceStore;
    use tower::ServiceExt;

    use crate::config::ServerConfig;
    use crate::state::AppState;

    pub async fn state_with(config: ServerConfig) -> Arc<AppState> {
        AppState::new(config, Arc::new(MemoryPreferenceStore::default()))
            .await
            .unwrap()
    }

    pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    pub async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn json(app: Router, method: &str, uri: &str, body: serde_json::Value) -> (StatusCode, String) {
        send(
            app,
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::config::ServerConfig;
    use axum::{body::Body, http::Request, http::StatusCode};

    fn with_token() -> ServerConfig {
        ServerConfig {
            api_token: Some("s3cret".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_health_is_open_with_token_configured() {
        let app = api_routes(state_with(with_token()).await);
        let (status, _) = get(app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let app = api_routes(state_with(with_token()).await);
        let (status, body) = get(app, "/api/preferences").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"error":"Unauthorized"}"#);
    }

    #[tokio::test]
    async fn test_api_accepts_token() {
        let app = api_routes(state_with(with_token()).await);
        let request = Request::builder()
            .uri("/api/preferences")
            .header("authorization", "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_open_without_token() {
        let app = api_routes(state_with(ServerConfig::default()).await);
        let (status, _) = get(app, "/api/preferences").await;
        assert_eq!(status, StatusCode::OK);
    }
}
