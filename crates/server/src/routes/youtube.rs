// crates/server/src/routes/youtube.rs
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use lifedash_core::WatchedVideo;

use crate::error::ApiResult;
use crate::state::AppState;

/// GET /api/youtube/recently-watched - latest history entry, or `null`.
pub async fn recently_watched(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Option<WatchedVideo>>> {
    let video = state.supabase()?.recently_watched().await?;
    Ok(Json(video))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/youtube/recently-watched", get(recently_watched))
}
