// crates/server/src/config.rs
//! Command-line and environment configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47900;

pub const DEFAULT_NOTION_API_URL: &str = "https://api.notion.com/v1";
pub const DEFAULT_GOOGLE_CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";

/// lifedash - personal life dashboard API
#[derive(Parser, Debug, Clone)]
#[command(name = "lifedash", version)]
#[command(about = "Aggregates media, habits, health, finance and calendar data for the dashboard")]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "LIFEDASH_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "LIFEDASH_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// Preferences file (collapsed groups, toggles)
    #[arg(long, env = "LIFEDASH_PREFS", default_value = "lifedash-prefs.json")]
    pub prefs_path: PathBuf,

    /// Supabase project URL (the REST API lives under /rest/v1)
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase service key
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// Notion integration token
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    pub notion_token: Option<String>,

    /// Notion database holding habits
    #[arg(long, env = "NOTION_HABITS_DB")]
    pub notion_habits_db: Option<String>,

    /// Notion database media is synced from
    #[arg(long, env = "NOTION_MEDIA_DB")]
    pub notion_media_db: Option<String>,

    #[arg(long, env = "NOTION_API_URL", default_value = DEFAULT_NOTION_API_URL)]
    pub notion_api_url: String,

    /// Google Calendar OAuth access token
    #[arg(long, env = "GOOGLE_CALENDAR_TOKEN", hide_env_values = true)]
    pub google_calendar_token: Option<String>,

    #[arg(long, env = "GOOGLE_CALENDAR_ID", default_value = "primary")]
    pub google_calendar_id: String,

    #[arg(long, env = "GOOGLE_CALENDAR_API_URL", default_value = DEFAULT_GOOGLE_CALENDAR_API_URL)]
    pub google_calendar_api_url: String,

    /// Bearer token required on /api routes. Unset leaves the API open.
    #[arg(long, env = "LIFEDASH_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Currency asset worths are stored in when a row has none
    #[arg(long, env = "LIFEDASH_BASE_CURRENCY", default_value = "EUR")]
    pub base_currency: String,

    /// Upstream request timeout in seconds
    #[arg(long, env = "LIFEDASH_REQUEST_TIMEOUT_SECS", default_value_t = 15)]
    pub request_timeout_secs: u64,

    /// Image proxy timeout in seconds
    #[arg(long, env = "LIFEDASH_IMAGE_TIMEOUT_SECS", default_value_t = 8)]
    pub image_timeout_secs: u64,
}

/// Supabase connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub key: String,
}

/// Notion connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotionConfig {
    pub api_url: String,
    pub token: String,
    pub habits_db: Option<String>,
    pub media_db: Option<String>,
}

/// Google Calendar connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarConfig {
    pub api_url: String,
    pub token: String,
    pub calendar_id: String,
}

/// Resolved configuration handed to [`crate::AppState`].
///
/// A `None` service leaves its routes answering 503.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub prefs_path: PathBuf,
    pub supabase: Option<SupabaseConfig>,
    pub notion: Option<NotionConfig>,
    pub calendar: Option<CalendarConfig>,
    pub api_token: Option<String>,
    pub base_currency: String,
    pub request_timeout: Duration,
    pub image_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            prefs_path: PathBuf::from("lifedash-prefs.json"),
            supabase: None,
            notion: None,
            calendar: None,
            api_token: None,
            base_currency: "EUR".to_string(),
            request_timeout: Duration::from_secs(15),
            image_timeout: Duration::from_secs(8),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        let supabase = match (non_empty(cli.supabase_url), non_empty(cli.supabase_key)) {
            (Some(url), Some(key)) => Some(SupabaseConfig {
                url: url.trim_end_matches('/').to_string(),
                key,
            }),
            _ => None,
        };
        let notion = non_empty(cli.notion_token).map(|token| NotionConfig {
            api_url: cli.notion_api_url.trim_end_matches('/').to_string(),
            token,
            habits_db: non_empty(cli.notion_habits_db),
            media_db: non_empty(cli.notion_media_db),
        });
        let calendar = non_empty(cli.google_calendar_token).map(|token| CalendarConfig {
            api_url: cli.google_calendar_api_url.trim_end_matches('/').to_string(),
            token,
            calendar_id: cli.google_calendar_id,
        });

        Self {
            addr: SocketAddr::new(cli.host, cli.port),
            prefs_path: cli.prefs_path,
            supabase,
            notion,
            calendar,
            api_token: non_empty(cli.api_token),
            base_currency: cli.base_currency.to_ascii_uppercase(),
            request_timeout: Duration::from_secs(cli.request_timeout_secs.max(1)),
            image_timeout: Duration::from_secs(cli.image_timeout_secs.max(1)),
        }
    }
}
