// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use lifedash_core::{
    Habit, KeyedMutationQueue, MediaRecord, PreferenceError, PreferenceStore, Preferences,
    RecordCache,
};
use tokio::sync::Mutex;

use crate::config::ServerConfig;
use crate::upstream::{GoogleCalendarClient, NotionClient, SupabaseClient, UpstreamError};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    pub config: ServerConfig,
    /// Shared HTTP client (also used by the image proxy and link previews).
    pub http: reqwest::Client,
    pub supabase: Option<SupabaseClient>,
    pub notion: Option<NotionClient>,
    pub calendar: Option<GoogleCalendarClient>,
    /// Where preferences are persisted.
    pub prefs_store: Arc<dyn PreferenceStore>,
    /// Preferences loaded at startup. Held across the store write so
    /// concurrent updates apply one after another.
    pub preferences: Mutex<Preferences>,
    /// Last fetched media collection with in-flight optimistic edits.
    pub media: RecordCache<MediaRecord>,
    /// Last fetched habits.
    pub habits: RecordCache<Habit>,
    /// Serializes mutations on the same record id.
    pub mutations: KeyedMutationQueue,
}

impl AppState {
    /// Build the state, loading preferences from `prefs_store`.
    ///
    /// A malformed preferences file is logged and replaced by defaults on the
    /// next save; any other store error fails startup.
    pub async fn new(
        config: ServerConfig,
        prefs_store: Arc<dyn PreferenceStore>,
    ) -> anyhow::Result<Arc<Self>> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("lifedash/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let preferences = match prefs_store.load().await {
            Ok(p) => p,
            Err(e @ PreferenceError::Malformed { .. }) => {
                tracing::warn!(error = %e, "Ignoring malformed preferences, using defaults");
                Preferences::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Arc::new(Self {
            start_time: Instant::now(),
            supabase: config
                .supabase
                .as_ref()
                .map(|c| SupabaseClient::new(http.clone(), c)),
            notion: config.notion.as_ref().map(|c| NotionClient::new(http.clone(), c)),
            calendar: config
                .calendar
                .as_ref()
                .map(|c| GoogleCalendarClient::new(http.clone(), c)),
            http,
            config,
            prefs_store,
            preferences: Mutex::new(preferences),
            media: RecordCache::new(),
            habits: RecordCache::new(),
            mutations: KeyedMutationQueue::new(),
        }))
    }

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn supabase(&self) -> Result<&SupabaseClient, UpstreamError> {
        self.supabase
            .as_ref()
            .ok_or(UpstreamError::NotConfigured { service: "supabase" })
    }

    pub fn notion(&self) -> Result<&NotionClient, UpstreamError> {
        self.notion
            .as_ref()
            .ok_or(UpstreamError::NotConfigured { service: "notion" })
    }

    pub fn calendar(&self) -> Result<&GoogleCalendarClient, UpstreamError> {
        self.calendar
            .as_ref()
            .ok_or(UpstreamError::NotConfigured { service: "google_calendar" })
    }

    /// Snapshot of the current preferences.
    pub async fn preferences(&self) -> Preferences {
        self.preferences.lock().await.clone()
    }
}
