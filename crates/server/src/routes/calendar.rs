// crates/server/src/routes/calendar.rs
//! Google Calendar events and the people attached to them.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch},
    Json, Router,
};
use lifedash_core::{CalendarEvent, EventPerson};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::upstream::google_calendar::{EventPatch, NewEvent};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub time_min: Option<String>,
    pub time_max: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct EventsResponse {
    pub events: Vec<CalendarEvent>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct EventResponse {
    pub event: CalendarEvent,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct PeopleResponse {
    pub people: Vec<EventPerson>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct PersonResponse {
    pub person: EventPerson,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPersonRequest {
    pub person_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

fn validate_new_event(event: &NewEvent) -> Result<(), ApiError> {
    if event.summary.trim().is_empty() {
        return Err(ApiError::BadRequest("summary is required".into()));
    }
    if event.start.trim().is_empty() || event.end.trim().is_empty() {
        return Err(ApiError::BadRequest("start and end are required".into()));
    }
    Ok(())
}

/// GET /api/google-calendar/events?timeMin=&timeMax=
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<EventsResponse>> {
    let events = state
        .calendar()?
        .list_events(query.time_min.as_deref(), query.time_max.as_deref())
        .await?;
    Ok(Json(EventsResponse { events }))
}

/// POST /api/google-calendar/events
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewEvent>,
) -> ApiResult<(StatusCode, Json<EventResponse>)> {
    validate_new_event(&body)?;
    let event = state.calendar()?.create_event(&body).await?;
    tracing::info!(event_id = %event.id, "Created calendar event");
    Ok((StatusCode::CREATED, Json(EventResponse { event })))
}

/// PATCH /api/google-calendar/events/{id}
pub async fn update_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<EventPatch>,
) -> ApiResult<Json<EventResponse>> {
    if body == EventPatch::default() {
        return Err(ApiError::BadRequest("patch has no fields".into()));
    }
    let event = state
        .calendar()?
        .update_event(&id, &body)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("event {id}")))?;
    Ok(Json(EventResponse { event }))
}

/// DELETE /api/google-calendar/events/{id}
pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeletedResponse>> {
    if !state.calendar()?.delete_event(&id).await? {
        return Err(ApiError::NotFound(format!("event {id}")));
    }
    Ok(Json(DeletedResponse { deleted: true }))
}

/// GET /api/events/{id}/people
pub async fn list_people(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<PeopleResponse>> {
    let people = state.supabase()?.event_people(&event_id).await?;
    Ok(Json(PeopleResponse { people }))
}

/// POST /api/events/{id}/people
pub async fn add_person(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
    Json(body): Json<AddPersonRequest>,
) -> ApiResult<(StatusCode, Json<PersonResponse>)> {
    let person_id = body.person_id.trim();
    if person_id.is_empty() {
        return Err(ApiError::BadRequest("personId is required".into()));
    }
    let link = EventPerson {
        event_id,
        person_id: person_id.to_string(),
        name: body.name.filter(|n| !n.trim().is_empty()),
    };
    let person = state.supabase()?.add_event_person(&link).await?;
    Ok((StatusCode::CREATED, Json(PersonResponse { person })))
}

/// DELETE /api/events/{id}/people/{person_id}
pub async fn remove_person(
    State(state): State<Arc<AppState>>,
    Path((event_id, person_id)): Path<(String, String)>,
) -> ApiResult<Json<DeletedResponse>> {
    if !state
        .supabase()?
        .remove_event_person(&event_id, &person_id)
        .await?
    {
        return Err(ApiError::NotFound(format!(
            "person {person_id} on event {event_id}"
        )));
    }
    Ok(Json(DeletedResponse { deleted: true }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/google-calendar/events", get(list_events).post(create_event))
        .route(
            "/google-calendar/events/{id}",
            patch(update_event).delete(delete_event),
        )
        .route("/events/{id}/people", get(list_people).post(add_person))
        .route("/events/{id}/people/{person_id}", delete(remove_person))
}
