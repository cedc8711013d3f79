// crates/server/src/routes/habits.rs
//! Habit tracking, proxied to the Notion habits database.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Duration, NaiveDate};
use lifedash_core::habits::{toggle_day, HabitHeatmap, HabitStats};
use lifedash_core::{optimistic_mutation, Habit};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::upstream::notion::HabitUpdate;

/// Default heatmap span when no start is given.
const DEFAULT_HEATMAP_DAYS: i64 = 364;
const MAX_HEATMAP_DAYS: i64 = 366 * 5;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct HabitsResponse {
    pub habits: Vec<Habit>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct HabitResponse {
    pub habit: Habit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub habit_id: String,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub habit_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorRequest {
    pub habit_id: String,
    pub color: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub habit_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HeatmapQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct HeatmapResponse {
    pub heatmap: HabitHeatmap,
    pub stats: Vec<HabitStats>,
}

fn apply_update(habit: &Habit, update: &HabitUpdate) -> Habit {
    let mut next = habit.clone();
    if let Some(name) = &update.name {
        next.name = name.clone();
    }
    if let Some(status) = &update.status {
        next.status = Some(status.clone());
    }
    if let Some(color) = &update.color {
        next.color = Some(color.clone());
    }
    if let Some(days) = &update.completed_days {
        next.completed_days = days.clone();
    }
    next
}

/// Read the current page, derive an update from it, apply it locally and
/// write it to Notion, reverting the cached habit if the write fails.
///
/// Runs under the habit's mutation permit, so two rapid toggles on one habit
/// each see the result of the previous one.
async fn mutate_habit(
    state: &AppState,
    id: &str,
    kind: &'static str,
    edit: impl FnOnce(&Habit) -> HabitUpdate,
) -> ApiResult<Habit> {
    let notion = state.notion()?;
    let _permit = state.mutations.lock(&format!("habit:{id}")).await;

    let current = notion
        .get_habit(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("habit {id}")))?;
    let update = edit(&current);
    let local = apply_update(&current, &update);

    let saved = optimistic_mutation(
        || {
            state.habits.begin_update(id, |_| local.clone());
        },
        notion.update_habit(id, &update),
        |e| {
            state.habits.revert(id);
            crate::metrics::record_revert(kind);
            tracing::warn!(record_id = %id, error = %e, kind, "Reverted optimistic habit edit");
        },
    )
    .await?;

    state.habits.commit(id, Some(saved.clone()));
    Ok(saved)
}

/// GET /api/notion/habits
pub async fn list_habits(State(state): State<Arc<AppState>>) -> ApiResult<Json<HabitsResponse>> {
    let habits = state.notion()?.list_habits().await?;
    state.habits.replace(habits.clone());
    Ok(Json(HabitsResponse { habits }))
}

/// POST /api/notion/habits - toggle one day.
pub async fn toggle_habit_day(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ToggleRequest>,
) -> ApiResult<Json<HabitResponse>> {
    let habit = mutate_habit(&state, &body.habit_id, "habit_toggle", |current| HabitUpdate {
        completed_days: Some(toggle_day(current, body.date).completed_days),
        ..Default::default()
    })
    .await?;
    Ok(Json(HabitResponse { habit }))
}

/// POST /api/notion/habits/status
pub async fn set_habit_status(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StatusRequest>,
) -> ApiResult<Json<HabitResponse>> {
    let habit = mutate_habit(&state, &body.habit_id, "habit_status", |_| HabitUpdate {
        status: Some(body.status.clone()),
        ..Default::default()
    })
    .await?;
    Ok(Json(HabitResponse { habit }))
}

/// POST /api/notion/habits/color
pub async fn set_habit_color(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ColorRequest>,
) -> ApiResult<Json<HabitResponse>> {
    let habit = mutate_habit(&state, &body.habit_id, "habit_color", |_| HabitUpdate {
        color: Some(body.color.clone()),
        ..Default::default()
    })
    .await?;
    Ok(Json(HabitResponse { habit }))
}

/// PUT /api/notion/habits/update
pub async fn update_habit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdateRequest>,
) -> ApiResult<Json<HabitResponse>> {
    let update = HabitUpdate {
        name: body.name.filter(|n| !n.trim().is_empty()),
        status: body.status,
        color: body.color,
        completed_days: None,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("update has no fields".into()));
    }
    let habit = mutate_habit(&state, &body.habit_id, "habit_update", |_| update.clone()).await?;
    Ok(Json(HabitResponse { habit }))
}

/// POST /api/notion/habits/create
pub async fn create_habit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateRequest>,
) -> ApiResult<(StatusCode, Json<HabitResponse>)> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("habit name is required".into()));
    }
    let habit = state
        .notion()?
        .create_habit(name, body.status.as_deref(), body.color.as_deref())
        .await?;
    state.habits.insert(habit.clone());
    tracing::info!(record_id = %habit.id, "Created habit");
    Ok((StatusCode::CREATED, Json(HabitResponse { habit })))
}

/// Resolve the requested range, defaulting to the year ending today.
fn heatmap_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let end = end.unwrap_or(today);
    let start = match start {
        Some(start) => start,
        None => end
            .checked_sub_signed(Duration::days(DEFAULT_HEATMAP_DAYS))
            .ok_or_else(|| ApiError::BadRequest(format!("end {end} is out of range")))?,
    };
    if start > end {
        return Err(ApiError::BadRequest(format!("start {start} is after end {end}")));
    }
    if (end - start).num_days() > MAX_HEATMAP_DAYS {
        return Err(ApiError::BadRequest("heatmap range is limited to five years".into()));
    }
    Ok((start, end))
}

/// GET /api/notion/habits/heatmap?start=&end=
pub async fn habit_heatmap(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HeatmapQuery>,
) -> ApiResult<Json<HeatmapResponse>> {
    let today = chrono::Local::now().date_naive();
    let (start, end) = heatmap_range(query.start, query.end, today)?;

    let habits = match state.habits.snapshot() {
        Some(h) => h,
        None => {
            let fetched = state.notion()?.list_habits().await?;
            state.habits.replace(fetched.clone());
            fetched
        }
    };

    Ok(Json(HeatmapResponse {
        heatmap: HabitHeatmap::build(&habits, start, end),
        stats: habits
            .iter()
            .map(|h| HabitStats::for_habit(h, end.min(today)))
            .collect(),
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notion/habits", get(list_habits).post(toggle_habit_day))
        .route("/notion/habits/status", post(set_habit_status))
        .route("/notion/habits/color", post(set_habit_color))
        .route("/notion/habits/update", put(update_habit))
        .route("/notion/habits/create", post(create_habit))
        .route("/notion/habits/heatmap", get(habit_heatmap))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NotionConfig, ServerConfig};
    use crate::routes::test_support::{get, json, state_with};
    use pretty_assertions::assert_eq;
    use serde_json::{json as j, Value};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page(id: &str, days: &str) -> Value {
        j!({
            "id": id,
            "properties": {
                "Name": { "title": [{ "plain_text": "Read" }] },
                "Status": { "select": { "name": "Active" } },
                "Completed Days": { "rich_text": [{ "plain_text": days }] }
            }
        })
    }

    async fn state_for(server: &MockServer) -> Arc<AppState> {
        state_with(ServerConfig {
            notion: Some(NotionConfig {
                api_url: server.uri(),
                token: "t".into(),
                habits_db: Some("habits".into()),
                media_db: None,
            }),
            ..Default::default()
        })
        .await
    }

    #[tokio::test]
    async fn test_toggle_adds_day_from_fresh_read() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pages/h1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page("h1", "2024-03-01")))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/pages/h1"))
            .and(body_partial_json(j!({
                "properties": { "Completed Days": { "rich_text": [{ "text": { "content": "2024-03-01,2024-03-02" } }] } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(page("h1", "2024-03-01,2024-03-02")))
            .expect(1)
            .mount(&server)
            .await;

        let app = crate::routes::api_routes(state_for(&server).await);
        let (status, body) = json(
            app,
            "POST",
            "/api/notion/habits",
            j!({ "habitId": "h1", "date": "2024-03-02" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let resp: HabitResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(resp.habit.completed_days.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_toggle_reverts_cached_habit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/databases/habits/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(j!({ "results": [page("h1", "")] })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pages/h1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page("h1", "")))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/pages/h1"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let state = state_for(&server).await;
        get(crate::routes::api_routes(state.clone()), "/api/notion/habits").await;
        let (status, _) = json(
            crate::routes::api_routes(state.clone()),
            "POST",
            "/api/notion/habits",
            j!({ "habitId": "h1", "date": "2024-03-02" }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.habits.get("h1").unwrap().completed_days.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_unknown_habit_is_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pages/nope"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let app = crate::routes::api_routes(state_for(&server).await);
        let (status, _) = json(
            app,
            "POST",
            "/api/notion/habits/status",
            j!({ "habitId": "nope", "status": "Paused" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let server = MockServer::start().await;
        let app = crate::routes::api_routes(state_for(&server).await);
        let (status, _) = json(app, "POST", "/api/notion/habits/create", j!({ "name": "  " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_heatmap_range_validation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/databases/habits/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(j!({ "results": [page("h1", "2024-03-04,2024-03-05")] })))
            .mount(&server)
            .await;
        let state = state_for(&server).await;

        let (status, _) = get(
            crate::routes::api_routes(state.clone()),
            "/api/notion/habits/heatmap?start=2024-03-10&end=2024-03-01",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(
            crate::routes::api_routes(state),
            "/api/notion/habits/heatmap?start=2024-03-04&end=2024-03-10",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["heatmap"]["weeks"].as_array().unwrap().len(), 1);
        assert_eq!(value["heatmap"]["weeks"][0][0]["level"], 4);
        assert_eq!(value["stats"][0]["longestStreak"], 2);
    }

    #[test]
    fn test_heatmap_range_defaults_and_limits() {
        let day = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let today = day("2024-03-10");

        let (start, end) = heatmap_range(None, None, today).unwrap();
        assert_eq!(end, today);
        assert_eq!((end - start).num_days(), DEFAULT_HEATMAP_DAYS);

        assert!(matches!(
            heatmap_range(None, Some(NaiveDate::MIN), today),
            Err(ApiError::BadRequest(_))
        ));
        assert!(heatmap_range(Some(NaiveDate::MAX), Some(NaiveDate::MAX), today).is_ok());
    }

    #[test]
    fn test_apply_update_keeps_unset_fields() {
        let habit = Habit::new("h", "Read");
        let next = apply_update(
            &habit,
            &HabitUpdate {
                color: Some("blue".into()),
                ..Default::default()
            },
        );
        assert_eq!(next.name, "Read");
        assert_eq!(next.color.as_deref(), Some("blue"));
    }
}
