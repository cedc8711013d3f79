// crates/server/src/routes/media.rs
//! Media list, grouped board, Notion sync and optimistic edits.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use lifedash_core::grouping::{MediaFilter, STATUS_TODO};
use lifedash_core::{build_board, optimistic_mutation, MediaBoard, MediaPatch, MediaRecord};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::link_preview;
use crate::state::AppState;
use crate::upstream::supabase::MediaInsert;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct MediaListResponse {
    pub media: Vec<MediaRecord>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct MediaResponse {
    pub media: MediaRecord,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct SyncResponse {
    pub synced: usize,
    pub media: Vec<MediaRecord>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct DeletedResponse {
    pub deleted: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    /// Overrides the stored toggle for this request.
    pub group_done_by_month: Option<bool>,
    /// Refetch instead of using the cached collection.
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateFromLinkRequest {
    pub url: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Fetch the collection from the store and refresh the cache.
async fn refresh_media(state: &AppState) -> ApiResult<Vec<MediaRecord>> {
    let media = state.supabase()?.list_media().await?;
    state.media.replace(media.clone());
    Ok(media)
}

/// GET /api/media
pub async fn list_media(State(state): State<Arc<AppState>>) -> ApiResult<Json<MediaListResponse>> {
    let media = refresh_media(&state).await?;
    Ok(Json(MediaListResponse { media }))
}

/// GET /api/media/board - filtered, grouped and clustered view.
pub async fn media_board(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BoardQuery>,
) -> ApiResult<Json<MediaBoard>> {
    let records = match state.media.snapshot() {
        Some(records) if !query.refresh => records,
        _ => refresh_media(&state).await?,
    };
    let filter = MediaFilter {
        category: query.category,
        search: query.search,
    };
    let preferences = state.preferences().await;
    Ok(Json(build_board(
        &records,
        &filter,
        &preferences,
        query.group_done_by_month,
    )))
}

/// POST /api/media/sync - pull the Notion media database into the store.
pub async fn sync_media(State(state): State<Arc<AppState>>) -> ApiResult<Json<SyncResponse>> {
    let pages = state.notion()?.list_media_pages().await?;
    let rows: Vec<MediaInsert> = pages.into_iter().map(MediaInsert::from).collect();
    let synced = state.supabase()?.upsert_media(&rows).await?;
    tracing::info!(pages = rows.len(), synced = synced.len(), "Media sync complete");

    let media = refresh_media(&state).await?;
    Ok(Json(SyncResponse {
        synced: synced.len(),
        media,
    }))
}

/// POST /api/media/create-from-link
pub async fn create_from_link(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateFromLinkRequest>,
) -> ApiResult<(StatusCode, Json<MediaResponse>)> {
    let url = link_preview::parse_http_url(&body.url)
        .ok_or_else(|| ApiError::BadRequest(format!("not an http(s) URL: {}", body.url)))?;
    let supabase = state.supabase()?;

    let category = body
        .category
        .filter(|c| !c.trim().is_empty())
        .or_else(|| link_preview::category_for(&url).map(String::from));
    let title = link_preview::fetch_title(&state.http, &url, state.config.request_timeout)
        .await
        .unwrap_or_else(|| url.to_string());

    let row = MediaInsert {
        title,
        status: Some(body.status.unwrap_or_else(|| STATUS_TODO.to_string())),
        category,
        created: Some(chrono::Utc::now().to_rfc3339()),
        link: Some(url.to_string()),
        ..Default::default()
    };
    let media = supabase.insert_media(&row).await?;
    state.media.insert(media.clone());
    tracing::info!(record_id = %media.id, "Created media from link");

    Ok((StatusCode::CREATED, Json(MediaResponse { media })))
}

/// PATCH /api/media/{id} - optimistic partial update.
pub async fn update_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<MediaPatch>,
) -> ApiResult<Json<MediaResponse>> {
    if patch.is_empty() {
        return Err(ApiError::BadRequest("patch has no fields".into()));
    }
    let supabase = state.supabase()?;
    let _permit = state.mutations.lock(&format!("media:{id}")).await;

    let updated = optimistic_mutation(
        || {
            state.media.begin_update(&id, |r| r.apply_patch(&patch));
        },
        supabase.update_media(&id, &patch),
        |e| {
            state.media.revert(&id);
            crate::metrics::record_revert("media_update");
            tracing::warn!(record_id = %id, error = %e, "Reverted optimistic media update");
        },
    )
    .await?;

    match updated {
        Some(media) => {
            state.media.commit(&id, Some(media.clone()));
            Ok(Json(MediaResponse { media }))
        }
        None => {
            state.media.revert(&id);
            Err(ApiError::NotFound(format!("media {id}")))
        }
    }
}

/// DELETE /api/media/{id} - optimistic removal.
pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeletedResponse>> {
    let supabase = state.supabase()?;
    let _permit = state.mutations.lock(&format!("media:{id}")).await;

    let deleted = optimistic_mutation(
        || {
            state.media.begin_remove(&id);
        },
        supabase.delete_media(&id),
        |e| {
            state.media.revert(&id);
            crate::metrics::record_revert("media_delete");
            tracing::warn!(record_id = %id, error = %e, "Reverted optimistic media delete");
        },
    )
    .await?;

    if !deleted {
        state.media.revert(&id);
        return Err(ApiError::NotFound(format!("media {id}")));
    }
    state.media.commit(&id, None);
    Ok(Json(DeletedResponse { deleted: id }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media", get(list_media))
        .route("/media/board", get(media_board))
        .route("/media/sync", post(sync_media))
        .route("/media/create-from-link", post(create_from_link))
        .route("/media/{id}", patch(update_media).delete(delete_media))
}
