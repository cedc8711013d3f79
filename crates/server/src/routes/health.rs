// crates/server/src/routes/health.rs
//! Health check endpoint for the API.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Which upstream services have credentials configured.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ServiceStatus {
    pub supabase: bool,
    pub notion: bool,
    pub google_calendar: bool,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub services: ServiceStatus,
}

/// GET /api/health - server status, version, uptime and configured services.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        services: ServiceStatus {
            supabase: state.supabase.is_some(),
            notion: state.notion.is_some(),
            google_calendar: state.calendar.is_some(),
        },
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServerConfig, SupabaseConfig};
    use crate::routes::test_support::{get, state_with};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health_reports_configured_services() {
        let config = ServerConfig {
            supabase: Some(SupabaseConfig {
                url: "http://127.0.0.1:9".into(),
                key: "k".into(),
            }),
            ..Default::default()
        };
        let app = crate::routes::api_routes(state_with(config).await);
        let (status, body) = get(app, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
        assert!(health.services.supabase);
        assert!(!health.services.notion);
    }
}
