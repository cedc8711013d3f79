// crates/server/src/upstream/supabase.rs
//! PostgREST client for the Supabase tables backing media, tracking,
//! finance, watch history and event people.

use lifedash_core::allocation::ExchangeRates;
use lifedash_core::{AssetRecord, EventPerson, MediaPatch, MediaRecord, TrackingEntry, WatchedVideo};
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};

use super::{decode, send, UpstreamError};
use crate::config::SupabaseConfig;

const SERVICE: &str = "supabase";

const MEDIA_TABLE: &str = "media";
const TRACKING_TABLE: &str = "tracking";
const ASSETS_TABLE: &str = "assets";
const RATES_TABLE: &str = "exchange_rates";
const WATCH_HISTORY_TABLE: &str = "youtube_history";
const EVENT_PEOPLE_TABLE: &str = "event_people";

/// Row written to the media table. Every key is always present so bulk
/// upserts send a uniform column set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaInsert {
    pub notion_page_id: Option<String>,
    pub title: String,
    pub status: Option<String>,
    pub category: Option<String>,
    pub created: Option<String>,
    pub monthly_tracking: Vec<String>,
    pub related_notion_page_ids: Vec<String>,
    pub link: Option<String>,
    pub thumbnail_url: Option<String>,
    pub rating: Option<f64>,
}

impl From<MediaRecord> for MediaInsert {
    fn from(r: MediaRecord) -> Self {
        Self {
            notion_page_id: r.notion_page_id,
            title: r.title,
            status: r.status,
            category: r.category,
            created: r.created,
            monthly_tracking: r.monthly_tracking,
            related_notion_page_ids: r.related_notion_page_ids,
            link: r.link,
            thumbnail_url: r.thumbnail_url,
            rating: r.rating,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RateRow {
    currency: String,
    rate: f64,
}

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    rest_url: String,
    key: String,
}

impl SupabaseClient {
    pub fn new(http: reqwest::Client, config: &SupabaseConfig) -> Self {
        Self {
            http,
            rest_url: format!("{}/rest/v1", config.url.trim_end_matches('/')),
            key: config.key.clone(),
        }
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    // ---- media ---------------------------------------------------------

    pub async fn list_media(&self) -> Result<Vec<MediaRecord>, UpstreamError> {
        let req = self
            .request(Method::GET, MEDIA_TABLE)
            .query(&[("select", "*"), ("order", "created.desc.nullslast")]);
        decode(SERVICE, send(SERVICE, req).await?).await
    }

    pub async fn insert_media(&self, row: &MediaInsert) -> Result<MediaRecord, UpstreamError> {
        let req = self
            .request(Method::POST, MEDIA_TABLE)
            .header("Prefer", "return=representation")
            .json(&[row]);
        let rows: Vec<MediaRecord> = decode(SERVICE, send(SERVICE, req).await?).await?;
        first_row(rows)
    }

    /// Insert or update rows keyed by their Notion page id.
    pub async fn upsert_media(&self, rows: &[MediaInsert]) -> Result<Vec<MediaRecord>, UpstreamError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let req = self
            .request(Method::POST, MEDIA_TABLE)
            .query(&[("on_conflict", "notion_page_id")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(rows);
        decode(SERVICE, send(SERVICE, req).await?).await
    }

    /// `Ok(None)` when no row has this id.
    pub async fn update_media(
        &self,
        id: &str,
        patch: &MediaPatch,
    ) -> Result<Option<MediaRecord>, UpstreamError> {
        let req = self
            .request(Method::PATCH, MEDIA_TABLE)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(patch);
        let rows: Vec<MediaRecord> = decode(SERVICE, send(SERVICE, req).await?).await?;
        Ok(rows.into_iter().next())
    }

    /// `Ok(false)` when no row has this id.
    pub async fn delete_media(&self, id: &str) -> Result<bool, UpstreamError> {
        let req = self
            .request(Method::DELETE, MEDIA_TABLE)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation");
        let rows: Vec<serde_json::Value> = decode(SERVICE, send(SERVICE, req).await?).await?;
        Ok(!rows.is_empty())
    }

    // ---- watch history ---------------------------------------------------

    /// Most recently watched video, `None` when the history is empty.
    pub async fn recently_watched(&self) -> Result<Option<WatchedVideo>, UpstreamError> {
        let req = self
            .request(Method::GET, WATCH_HISTORY_TABLE)
            .query(&[("select", "*"), ("order", "watched_at.desc"), ("limit", "1")])
            .header("Accept", "application/vnd.pgrst.object+json");
        match send(SERVICE, req).await {
            Ok(resp) => decode(SERVICE, resp).await.map(Some),
            Err(e) if e.is_no_rows() => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ---- tracking & finance ---------------------------------------------

    pub async fn list_tracking(&self) -> Result<Vec<TrackingEntry>, UpstreamError> {
        let req = self
            .request(Method::GET, TRACKING_TABLE)
            .query(&[("select", "*"), ("order", "date.asc.nullsfirst")]);
        decode(SERVICE, send(SERVICE, req).await?).await
    }

    pub async fn list_assets(&self) -> Result<Vec<AssetRecord>, UpstreamError> {
        let req = self.request(Method::GET, ASSETS_TABLE).query(&[("select", "*")]);
        decode(SERVICE, send(SERVICE, req).await?).await
    }

    /// Rates relative to `base` (`1 base = rate`).
    pub async fn exchange_rates(&self, base: &str) -> Result<ExchangeRates, UpstreamError> {
        let req = self
            .request(Method::GET, RATES_TABLE)
            .query(&[("select", "currency,rate")]);
        let rows: Vec<RateRow> = decode(SERVICE, send(SERVICE, req).await?).await?;
        Ok(rows
            .into_iter()
            .fold(ExchangeRates::new(base), |rates, row| rates.with_rate(&row.currency, row.rate)))
    }

    // ---- event people -----------------------------------------------------

    pub async fn event_people(&self, event_id: &str) -> Result<Vec<EventPerson>, UpstreamError> {
        let req = self
            .request(Method::GET, EVENT_PEOPLE_TABLE)
            .query(&[("select", "*".to_string()), ("event_id", format!("eq.{event_id}"))]);
        decode(SERVICE, send(SERVICE, req).await?).await
    }

    pub async fn add_event_person(&self, person: &EventPerson) -> Result<EventPerson, UpstreamError> {
        let req = self
            .request(Method::POST, EVENT_PEOPLE_TABLE)
            .header("Prefer", "return=representation")
            .json(&[person]);
        let rows: Vec<EventPerson> = decode(SERVICE, send(SERVICE, req).await?).await?;
        first_row(rows)
    }

    /// `Ok(false)` when the link did not exist.
    pub async fn remove_event_person(&self, event_id: &str, person_id: &str) -> Result<bool, UpstreamError> {
        let req = self
            .request(Method::DELETE, EVENT_PEOPLE_TABLE)
            .query(&[
                ("event_id", format!("eq.{event_id}")),
                ("person_id", format!("eq.{person_id}")),
            ])
            .header("Prefer", "return=representation");
        let rows: Vec<serde_json::Value> = decode(SERVICE, send(SERVICE, req).await?).await?;
        Ok(!rows.is_empty())
    }
}

fn first_row<T>(rows: Vec<T>) -> Result<T, UpstreamError> {
    rows.into_iter().next().ok_or_else(|| UpstreamError::Decode {
        service: SERVICE,
        message: "insert returned no rows".to_string(),
    })
}
