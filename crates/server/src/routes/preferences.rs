// crates/server/src/routes/preferences.rs
//! Display preferences: collapsed board groups and feature toggles.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use lifedash_core::preferences::PreferencesPatch;
use lifedash_core::Preferences;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CollapsedRequest {
    pub group: String,
    pub collapsed: bool,
}

/// Apply `edit` to a copy, persist it, then publish it. The lock is held
/// across the write so a failed save leaves the served preferences unchanged.
async fn update_preferences(
    state: &AppState,
    edit: impl FnOnce(&mut Preferences),
) -> ApiResult<Preferences> {
    let mut current = state.preferences.lock().await;
    let mut next = current.clone();
    edit(&mut next);
    state.prefs_store.save(&next).await?;
    *current = next.clone();
    Ok(next)
}

/// GET /api/preferences
pub async fn get_preferences(State(state): State<Arc<AppState>>) -> Json<Preferences> {
    Json(state.preferences().await)
}

/// PUT /api/preferences
pub async fn put_preferences(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<PreferencesPatch>,
) -> ApiResult<Json<Preferences>> {
    let prefs = update_preferences(&state, |p| p.merge(patch)).await?;
    tracing::debug!(collapsed = prefs.collapsed_groups.len(), "Preferences updated");
    Ok(Json(prefs))
}

/// POST /api/preferences/collapsed
pub async fn set_collapsed(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CollapsedRequest>,
) -> ApiResult<Json<Preferences>> {
    let group = body.group.trim().to_string();
    if group.is_empty() {
        return Err(ApiError::BadRequest("group is required".into()));
    }
    let prefs = update_preferences(&state, |p| p.set_collapsed(group, body.collapsed)).await?;
    Ok(Json(prefs))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/preferences", get(get_preferences).put(put_preferences))
        .route("/preferences/collapsed", post(set_collapsed))
}
