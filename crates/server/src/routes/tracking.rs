// crates/server/src/routes/tracking.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use lifedash_core::trend::{build_trend_window, TrendWindow};
use lifedash_core::{Metric, TrackingEntry};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct TrackingResponse {
    pub entries: Vec<TrackingEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub metric: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrendResponse {
    pub metric: Metric,
    #[serde(flatten)]
    pub window: TrendWindow,
}

/// GET /api/tracking
pub async fn list_tracking(State(state): State<Arc<AppState>>) -> ApiResult<Json<TrackingResponse>> {
    let entries = state.supabase()?.list_tracking().await?;
    Ok(Json(TrackingResponse { entries }))
}

/// GET /api/tracking/{id}/trend?metric=
///
/// 404 when the entry is unknown, has no value for the metric, or has too
/// few neighbours to draw a line.
pub async fn tracking_trend(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<TrendQuery>,
) -> ApiResult<Json<TrendResponse>> {
    let metric = match query.metric.as_deref() {
        Some(raw) => raw.parse::<Metric>().map_err(ApiError::BadRequest)?,
        None => Metric::RestingHeartRate,
    };
    let entries = state.supabase()?.list_tracking().await?;
    let window = build_trend_window(&id, &entries, metric)
        .ok_or_else(|| ApiError::NotFound(format!("no {metric} trend for entry {id}")))?;
    Ok(Json(TrendResponse { metric, window }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tracking", get(list_tracking))
        .route("/tracking/{id}/trend", get(tracking_trend))
}
