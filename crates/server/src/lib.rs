// crates/server/src/lib.rs
//! Lifedash server library.
//!
//! Axum HTTP server for the personal dashboard. It proxies Supabase, Notion
//! and Google Calendar, and serves the media board, habit heatmaps, health
//! trends and portfolio allocation computed by `lifedash-core`.

pub mod auth;
pub mod config;
pub mod error;
pub mod link_preview;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod upstream;

pub use config::{Cli, ServerConfig};
pub use error::*;
pub use metrics::{init_metrics, record_revert, record_upstream};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (media, habits, calendar, tracking, finance, preferences)
/// - CORS for the dashboard dev server (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
