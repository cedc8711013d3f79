// crates/server/src/upstream/notion.rs
//! Notion API client: the habits database and the media source database.

use chrono::NaiveDate;
use lifedash_core::{Habit, MediaRecord};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{decode, send, UpstreamError};
use crate::config::NotionConfig;

const SERVICE: &str = "notion";
const NOTION_VERSION: &str = "2022-06-28";
/// Notion rejects rich text objects longer than this.
const RICH_TEXT_LIMIT: usize = 2000;
const PAGE_SIZE: u32 = 100;

// Habit database properties.
const HABIT_NAME: &str = "Name";
const HABIT_STATUS: &str = "Status";
const HABIT_COLOR: &str = "Color";
const HABIT_DAYS: &str = "Completed Days";

// Media database properties.
const MEDIA_NAME: &str = "Name";
const MEDIA_STATUS: &str = "Status";
const MEDIA_CATEGORY: &str = "Category";
const MEDIA_CREATED: &str = "Created";
const MEDIA_MONTHS: &str = "Monthly Tracking";
const MEDIA_RELATED: &str = "Related";
const MEDIA_LINK: &str = "Link";
const MEDIA_RATING: &str = "Rating";

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Properties to change on a habit page. `None` leaves a property alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HabitUpdate {
    pub name: Option<String>,
    pub status: Option<String>,
    pub color: Option<String>,
    pub completed_days: Option<Vec<NaiveDate>>,
}

impl HabitUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn properties(&self) -> Value {
        let mut props = Map::new();
        if let Some(name) = &self.name {
            props.insert(HABIT_NAME.into(), title_value(name));
        }
        if let Some(status) = &self.status {
            props.insert(HABIT_STATUS.into(), select_value(status));
        }
        if let Some(color) = &self.color {
            props.insert(HABIT_COLOR.into(), select_value(color));
        }
        if let Some(days) = &self.completed_days {
            props.insert(HABIT_DAYS.into(), rich_text_value(&format_days(days)));
        }
        Value::Object(props)
    }
}

#[derive(Debug, Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    habits_db: Option<String>,
    media_db: Option<String>,
}

impl NotionClient {
    pub fn new(http: reqwest::Client, config: &NotionConfig) -> Self {
        Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            habits_db: config.habits_db.clone(),
            media_db: config.media_db.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.api_url, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    fn habits_db(&self) -> Result<&str, UpstreamError> {
        self.habits_db
            .as_deref()
            .ok_or(UpstreamError::NotConfigured { service: "notion habits database" })
    }

    async fn query_database(&self, database_id: &str) -> Result<Vec<Value>, UpstreamError> {
        let path = format!("databases/{}/query", urlencoding::encode(database_id));
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(c) = &cursor {
                body["start_cursor"] = Value::String(c.clone());
            }
            let req = self.request(Method::POST, &path).json(&body);
            let page: QueryResponse = decode(SERVICE, send(SERVICE, req).await?).await?;
            pages.extend(page.results);
            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }
        Ok(pages)
    }

    // ---- habits ----------------------------------------------------------

    pub async fn list_habits(&self) -> Result<Vec<Habit>, UpstreamError> {
        let pages = self.query_database(self.habits_db()?).await?;
        Ok(pages.iter().filter_map(habit_from_page).collect())
    }

    /// `Ok(None)` when the page does not exist.
    pub async fn get_habit(&self, id: &str) -> Result<Option<Habit>, UpstreamError> {
        let req = self.request(Method::GET, &format!("pages/{}", urlencoding::encode(id)));
        let resp = match send(SERVICE, req).await {
            Ok(r) => r,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let page: Value = decode(SERVICE, resp).await?;
        Ok(habit_from_page(&page))
    }

    pub async fn update_habit(&self, id: &str, update: &HabitUpdate) -> Result<Habit, UpstreamError> {
        let req = self
            .request(Method::PATCH, &format!("pages/{}", urlencoding::encode(id)))
            .json(&json!({ "properties": update.properties() }));
        let page: Value = decode(SERVICE, send(SERVICE, req).await?).await?;
        habit_from_page(&page).ok_or_else(|| not_a_page("habit"))
    }

    pub async fn create_habit(
        &self,
        name: &str,
        status: Option<&str>,
        color: Option<&str>,
    ) -> Result<Habit, UpstreamError> {
        let update = HabitUpdate {
            name: Some(name.to_string()),
            status: status.map(String::from),
            color: color.map(String::from),
            completed_days: Some(Vec::new()),
        };
        let body = json!({
            "parent": { "database_id": self.habits_db()? },
            "properties": update.properties(),
        });
        let req = self.request(Method::POST, "pages").json(&body);
        let page: Value = decode(SERVICE, send(SERVICE, req).await?).await?;
        habit_from_page(&page).ok_or_else(|| not_a_page("habit"))
    }

    // ---- media -----------------------------------------------------------

    /// Every page of the media database as a record keyed by its page id.
    pub async fn list_media_pages(&self) -> Result<Vec<MediaRecord>, UpstreamError> {
        let db = self
            .media_db
            .as_deref()
            .ok_or(UpstreamError::NotConfigured { service: "notion media database" })?;
        let pages = self.query_database(db).await?;
        Ok(pages.iter().filter_map(media_from_page).collect())
    }
}

fn not_a_page(kind: &str) -> UpstreamError {
    UpstreamError::Decode {
        service: SERVICE,
        message: format!("response is not a {kind} page"),
    }
}

// ============================================================================
// Page decoding
// ============================================================================

fn prop<'a>(page: &'a Value, name: &str) -> Option<&'a Value> {
    page.get("properties")?.get(name)
}

fn plain_text(items: &Value) -> String {
    items
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|t| t.get("plain_text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

fn title_of(page: &Value, name: &str) -> String {
    prop(page, name)
        .and_then(|p| p.get("title"))
        .map(plain_text)
        .unwrap_or_default()
}

fn rich_text_of(page: &Value, name: &str) -> String {
    prop(page, name)
        .and_then(|p| p.get("rich_text"))
        .map(plain_text)
        .unwrap_or_default()
}

/// A `select` or `status` property's option name.
fn select_of(page: &Value, name: &str) -> Option<String> {
    let p = prop(page, name)?;
    p.get("select")
        .filter(|v| !v.is_null())
        .or_else(|| p.get("status"))?
        .get("name")?
        .as_str()
        .map(String::from)
}

fn multi_select_of(page: &Value, name: &str) -> Vec<String> {
    prop(page, name)
        .and_then(|p| p.get("multi_select"))
        .and_then(Value::as_array)
        .map(|opts| {
            opts.iter()
                .filter_map(|o| o.get("name").and_then(Value::as_str).map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn relation_of(page: &Value, name: &str) -> Vec<String> {
    prop(page, name)
        .and_then(|p| p.get("relation"))
        .and_then(Value::as_array)
        .map(|rels| {
            rels.iter()
                .filter_map(|r| r.get("id").and_then(Value::as_str).map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn date_of(page: &Value, name: &str) -> Option<String> {
    prop(page, name)?
        .get("date")?
        .get("start")?
        .as_str()
        .map(String::from)
}

fn cover_url(page: &Value) -> Option<String> {
    let cover = page.get("cover")?;
    cover
        .get("external")
        .or_else(|| cover.get("file"))?
        .get("url")?
        .as_str()
        .map(String::from)
}

/// Dates stored as comma- or whitespace-separated `YYYY-MM-DD`.
pub fn parse_days(raw: &str) -> Vec<NaiveDate> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter_map(|s| match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                tracing::debug!(value = s, "Skipping unparseable completed day");
                None
            }
        })
        .collect()
}

pub fn format_days(days: &[NaiveDate]) -> String {
    days.iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn habit_from_page(page: &Value) -> Option<Habit> {
    let id = page.get("id")?.as_str()?;
    let mut habit = Habit::new(id, title_of(page, HABIT_NAME))
        .with_days(parse_days(&rich_text_of(page, HABIT_DAYS)));
    habit.status = select_of(page, HABIT_STATUS);
    habit.color = select_of(page, HABIT_COLOR);
    Some(habit)
}

pub(crate) fn media_from_page(page: &Value) -> Option<MediaRecord> {
    let id = page.get("id")?.as_str()?;
    let mut record = MediaRecord::new(id, title_of(page, MEDIA_NAME)).with_notion_page_id(id);
    record.status = select_of(page, MEDIA_STATUS);
    record.category = select_of(page, MEDIA_CATEGORY);
    record.created = date_of(page, MEDIA_CREATED).or_else(|| {
        page.get("created_time")
            .and_then(Value::as_str)
            .map(String::from)
    });
    record.monthly_tracking = multi_select_of(page, MEDIA_MONTHS);
    record.related_notion_page_ids = relation_of(page, MEDIA_RELATED);
    record.link = prop(page, MEDIA_LINK)
        .and_then(|p| p.get("url"))
        .and_then(Value::as_str)
        .map(String::from);
    record.rating = prop(page, MEDIA_RATING)
        .and_then(|p| p.get("number"))
        .and_then(Value::as_f64);
    record.thumbnail_url = cover_url(page);
    Some(record)
}

// ============================================================================
// Property encoding
// ============================================================================

fn title_value(text: &str) -> Value {
    json!({ "title": [{ "text": { "content": text } }] })
}

fn select_value(name: &str) -> Value {
    json!({ "select": { "name": name } })
}

/// Rich text split into objects no longer than Notion's per-object limit.
fn rich_text_value(text: &str) -> Value {
    let chars: Vec<char> = text.chars().collect();
    let parts: Vec<Value> = chars
        .chunks(RICH_TEXT_LIMIT)
        .map(|chunk| json!({ "text": { "content": chunk.iter().collect::<String>() } }))
        .collect();
    json!({ "rich_text": parts })
}
