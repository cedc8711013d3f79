// crates/server/src/upstream/google_calendar.rs
//! Google Calendar v3 events client.

use lifedash_core::CalendarEvent;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{decode, send, UpstreamError};
use crate::config::CalendarConfig;

const SERVICE: &str = "google_calendar";

#[derive(Debug, Deserialize)]
struct EventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

impl From<GoogleEvent> for CalendarEvent {
    fn from(e: GoogleEvent) -> Self {
        let (start, all_day) = match e.start {
            Some(EventTime { date_time: Some(t), .. }) => (t, false),
            Some(EventTime { date: Some(d), .. }) => (d, true),
            _ => (String::new(), false),
        };
        let end = e
            .end
            .and_then(|t| t.date_time.or(t.date))
            .unwrap_or_else(|| start.clone());
        CalendarEvent {
            id: e.id,
            summary: e.summary.unwrap_or_default(),
            description: e.description,
            start,
            end,
            location: e.location,
            all_day,
        }
    }
}

/// Body for creating an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub all_day: bool,
}

/// Partial event update. Times are sent only when given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub all_day: Option<bool>,
}

fn time_value(value: &str, all_day: bool) -> Value {
    if all_day {
        json!({ "date": value })
    } else {
        json!({ "dateTime": value })
    }
}

impl NewEvent {
    fn to_google(&self) -> Value {
        let mut body = json!({
            "summary": self.summary,
            "start": time_value(&self.start, self.all_day),
            "end": time_value(&self.end, self.all_day),
        });
        if let Some(description) = &self.description {
            body["description"] = json!(description);
        }
        if let Some(location) = &self.location {
            body["location"] = json!(location);
        }
        body
    }
}

impl EventPatch {
    fn to_google(&self) -> Value {
        // Without an explicit flag, date-only strings mean all-day.
        let all_day = |v: &str| self.all_day.unwrap_or(v.len() == 10);
        let mut body = Map::new();
        if let Some(summary) = &self.summary {
            body.insert("summary".into(), json!(summary));
        }
        if let Some(description) = &self.description {
            body.insert("description".into(), json!(description));
        }
        if let Some(location) = &self.location {
            body.insert("location".into(), json!(location));
        }
        if let Some(start) = &self.start {
            body.insert("start".into(), time_value(start, all_day(start)));
        }
        if let Some(end) = &self.end {
            body.insert("end".into(), time_value(end, all_day(end)));
        }
        Value::Object(body)
    }
}

#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    calendar_id: String,
}

impl GoogleCalendarClient {
    pub fn new(http: reqwest::Client, config: &CalendarConfig) -> Self {
        Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            calendar_id: config.calendar_id.clone(),
        }
    }

    fn request(&self, method: Method, suffix: &str) -> RequestBuilder {
        let url = format!(
            "{}/calendars/{}/events{}",
            self.api_url,
            urlencoding::encode(&self.calendar_id),
            suffix
        );
        self.http.request(method, url).bearer_auth(&self.token)
    }

    fn event_path(id: &str) -> String {
        format!("/{}", urlencoding::encode(id))
    }

    /// Expanded single events between the bounds, ordered by start time.
    pub async fn list_events(
        &self,
        time_min: Option<&str>,
        time_max: Option<&str>,
    ) -> Result<Vec<CalendarEvent>, UpstreamError> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params: Vec<(&str, String)> = vec![
                ("singleEvents", "true".into()),
                ("orderBy", "startTime".into()),
            ];
            if let Some(min) = time_min {
                params.push(("timeMin", min.to_string()));
            }
            if let Some(max) = time_max {
                params.push(("timeMax", max.to_string()));
            }
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }
            let req = self.request(Method::GET, "").query(&params);
            let page: EventList = decode(SERVICE, send(SERVICE, req).await?).await?;
            events.extend(page.items.into_iter().map(CalendarEvent::from));
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(events)
    }

    pub async fn create_event(&self, event: &NewEvent) -> Result<CalendarEvent, UpstreamError> {
        let req = self.request(Method::POST, "").json(&event.to_google());
        let created: GoogleEvent = decode(SERVICE, send(SERVICE, req).await?).await?;
        Ok(created.into())
    }

    /// `Ok(None)` when the event does not exist.
    pub async fn update_event(
        &self,
        id: &str,
        patch: &EventPatch,
    ) -> Result<Option<CalendarEvent>, UpstreamError> {
        let req = self
            .request(Method::PATCH, &Self::event_path(id))
            .json(&patch.to_google());
        match send(SERVICE, req).await {
            Ok(resp) => {
                let updated: GoogleEvent = decode(SERVICE, resp).await?;
                Ok(Some(updated.into()))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `Ok(false)` when the event does not exist (or was already deleted).
    pub async fn delete_event(&self, id: &str) -> Result<bool, UpstreamError> {
        let req = self.request(Method::DELETE, &Self::event_path(id));
        match send(SERVICE, req).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> GoogleCalendarClient {
        GoogleCalendarClient::new(
            reqwest::Client::new(),
            &CalendarConfig {
                api_url: server.uri(),
                token: "tok".into(),
                calendar_id: "primary".into(),
            },
        )
    }

    #[test]
    fn test_all_day_event_conversion() {
        let event: GoogleEvent = serde_json::from_value(json!({
            "id": "e1",
            "summary": "Holiday",
            "start": { "date": "2024-03-01" },
            "end": { "date": "2024-03-02" }
        }))
        .unwrap();
        let event = CalendarEvent::from(event);
        assert!(event.all_day);
        assert_eq!(event.start, "2024-03-01");
        assert_eq!(event.end, "2024-03-02");
    }

    #[test]
    fn test_patch_infers_all_day_from_date_only() {
        let patch = EventPatch {
            start: Some("2024-03-01".into()),
            end: Some("2024-03-01T10:00:00Z".into()),
            ..Default::default()
        };
        let body = patch.to_google();
        assert_eq!(body["start"], json!({ "date": "2024-03-01" }));
        assert_eq!(body["end"], json!({ "dateTime": "2024-03-01T10:00:00Z" }));
        assert!(body.get("summary").is_none());
    }

    #[tokio::test]
    async fn test_list_events_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "id": "b", "start": { "dateTime": "2024-03-02T09:00:00Z" } }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(header("authorization", "Bearer tok"))
            .and(query_param("timeMin", "2024-03-01T00:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "id": "a", "summary": "Standup", "start": { "dateTime": "2024-03-01T09:00:00Z" }, "end": { "dateTime": "2024-03-01T09:15:00Z" } }],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        let events = client(&server)
            .await
            .list_events(Some("2024-03-01T00:00:00Z"), None)
            .await
            .unwrap();
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(events[1].end, events[1].start, "missing end falls back to start");
    }

    #[tokio::test]
    async fn test_create_event_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(body_json(json!({
                "summary": "Dentist",
                "start": { "dateTime": "2024-03-05T14:00:00Z" },
                "end": { "dateTime": "2024-03-05T15:00:00Z" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "new",
                "summary": "Dentist",
                "start": { "dateTime": "2024-03-05T14:00:00Z" },
                "end": { "dateTime": "2024-03-05T15:00:00Z" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let event = NewEvent {
            summary: "Dentist".into(),
            description: None,
            start: "2024-03-05T14:00:00Z".into(),
            end: "2024-03-05T15:00:00Z".into(),
            location: None,
            all_day: false,
        };
        let created = client(&server).await.create_event(&event).await.unwrap();
        assert_eq!(created.id, "new");
    }

    #[tokio::test]
    async fn test_delete_gone_event() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/calendars/primary/events/old"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        assert!(!client(&server).await.delete_event("old").await.unwrap());
    }
}
