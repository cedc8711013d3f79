// crates/server/src/main.rs
//! Lifedash server binary.
//!
//! Parses configuration from flags and environment, loads preferences, and
//! serves the API until interrupted.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use lifedash_core::FilePreferenceStore;
use lifedash_server::{create_app, init_metrics, AppState, Cli, ServerConfig};
use tracing_subscriber::EnvFilter;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,lifedash_server=info".into()),
        )
        .init();

    let config = ServerConfig::from(Cli::parse());
    init_metrics();

    eprintln!("\nlifedash v{}\n", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(FilePreferenceStore::new(config.prefs_path.clone()));
    let addr = config.addr;
    let state = AppState::new(config, store).await?;

    for (service, configured) in [
        ("supabase", state.supabase.is_some()),
        ("notion", state.notion.is_some()),
        ("google_calendar", state.calendar.is_some()),
    ] {
        if !configured {
            tracing::warn!(service, "Service not configured, its routes will return 503");
        }
    }
    if state.config.api_token.is_none() {
        tracing::warn!("LIFEDASH_API_TOKEN not set, API is open to anyone who can reach it");
    }

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");
    eprintln!("  -> http://{addr}\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
