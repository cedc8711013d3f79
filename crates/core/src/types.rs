// crates/core/src/types.rs
//! Record types for every upstream source.
//!
//! Rows come from the store as loosely shaped JSON; each source gets its own
//! struct with explicit optional fields so malformed or partial rows degrade
//! into `None` instead of failing the whole collection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Serde helpers for upstream quirks (numeric ids, `null` arrays).
pub mod de {
    use serde::{Deserialize, Deserializer};

    /// Accept `"abc"`, `42` or `42.0` as a string id.
    pub fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Int(i64),
            Float(f64),
        }
        Ok(match Raw::deserialize(d)? {
            Raw::Str(s) => s,
            Raw::Int(n) => n.to_string(),
            Raw::Float(f) => f.to_string(),
        })
    }

    /// Treat an explicit `null` the same as a missing field.
    pub fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
    }
}

// ============================================================================
// Media
// ============================================================================

/// A media entry (movie, series, book, game...) tracked on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
pub struct MediaRecord {
    #[serde(deserialize_with = "de::string_or_number")]
    pub id: String,
    /// Id of the Notion page this record was synced from. Related-item
    /// references point at these ids, not at `id`.
    #[serde(default)]
    pub notion_page_id: Option<String>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Creation timestamp as stored upstream (RFC 3339 or `YYYY-MM-DD`).
    #[serde(default)]
    pub created: Option<String>,
    /// Month labels ("March 2024") the entry was tracked in, oldest first.
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub monthly_tracking: Vec<String>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub related_notion_page_ids: Vec<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
}

impl MediaRecord {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            notion_page_id: None,
            title: title.into(),
            status: None,
            category: None,
            created: None,
            monthly_tracking: Vec::new(),
            related_notion_page_ids: Vec::new(),
            link: None,
            thumbnail_url: None,
            rating: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_created(mut self, created: impl Into<String>) -> Self {
        self.created = Some(created.into());
        self
    }

    pub fn with_notion_page_id(mut self, page_id: impl Into<String>) -> Self {
        self.notion_page_id = Some(page_id.into());
        self
    }

    pub fn with_related(mut self, ids: &[&str]) -> Self {
        self.related_notion_page_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_monthly_tracking(mut self, months: &[&str]) -> Self {
        self.monthly_tracking = months.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Apply a partial update, returning the edited copy.
    pub fn apply_patch(&self, patch: &MediaPatch) -> Self {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = title.clone();
        }
        if let Some(status) = &patch.status {
            next.status = Some(status.clone());
        }
        if let Some(category) = &patch.category {
            next.category = Some(category.clone());
        }
        if let Some(months) = &patch.monthly_tracking {
            next.monthly_tracking = months.clone();
        }
        if let Some(related) = &patch.related_notion_page_ids {
            next.related_notion_page_ids = related.clone();
        }
        if let Some(link) = &patch.link {
            next.link = Some(link.clone());
        }
        if let Some(thumbnail) = &patch.thumbnail_url {
            next.thumbnail_url = Some(thumbnail.clone());
        }
        if let Some(rating) = patch.rating {
            next.rating = Some(rating);
        }
        next
    }
}

/// Partial update for a media record. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
pub struct MediaPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_tracking: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_notion_page_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl MediaPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// ============================================================================
// Habits
// ============================================================================

/// A habit with the set of days it was completed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    /// Sorted, de-duplicated completion days.
    #[serde(default)]
    pub completed_days: Vec<NaiveDate>,
}

impl Habit {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: None,
            color: None,
            completed_days: Vec::new(),
        }
    }

    pub fn with_days(mut self, days: impl IntoIterator<Item = NaiveDate>) -> Self {
        let mut days: Vec<NaiveDate> = days.into_iter().collect();
        days.sort_unstable();
        days.dedup();
        self.completed_days = days;
        self
    }

    pub fn is_done_on(&self, day: NaiveDate) -> bool {
        self.completed_days.binary_search(&day).is_ok()
    }
}

// ============================================================================
// Tracking (health metrics)
// ============================================================================

/// A daily tracking entry (health journal row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
pub struct TrackingEntry {
    #[serde(deserialize_with = "de::string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub title: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub resting_heart_rate: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub steps: Option<f64>,
    #[serde(default)]
    pub sleep_hours: Option<f64>,
}

impl TrackingEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            date: None,
            resting_heart_rate: None,
            weight: None,
            steps: None,
            sleep_hours: None,
        }
    }
}

/// Numeric field of a [`TrackingEntry`] a trend can be drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    RestingHeartRate,
    Weight,
    Steps,
    SleepHours,
}

impl Metric {
    pub fn value(self, entry: &TrackingEntry) -> Option<f64> {
        match self {
            Metric::RestingHeartRate => entry.resting_heart_rate,
            Metric::Weight => entry.weight,
            Metric::Steps => entry.steps,
            Metric::SleepHours => entry.sleep_hours,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::RestingHeartRate => "resting_heart_rate",
            Metric::Weight => "weight",
            Metric::Steps => "steps",
            Metric::SleepHours => "sleep_hours",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "resting_heart_rate" | "rhr" => Ok(Metric::RestingHeartRate),
            "weight" => Ok(Metric::Weight),
            "steps" | "step_count" => Ok(Metric::Steps),
            "sleep_hours" | "sleep" => Ok(Metric::SleepHours),
            other => Err(format!("unknown metric '{other}'")),
        }
    }
}

// ============================================================================
// Calendar
// ============================================================================

/// A calendar event as exposed to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// RFC 3339 timestamp, or `YYYY-MM-DD` for all-day events.
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub all_day: bool,
}

/// Link between a calendar event and a person record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
pub struct EventPerson {
    pub event_id: String,
    #[serde(deserialize_with = "de::string_or_number")]
    pub person_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

// ============================================================================
// Finance
// ============================================================================

/// A holding in the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
pub struct AssetRecord {
    #[serde(deserialize_with = "de::string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub name: String,
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub worth: Option<f64>,
    /// ISO 4217 code the worth is stored in.
    #[serde(default)]
    pub currency: Option<String>,
}

// ============================================================================
// Watch history
// ============================================================================

/// A watched YouTube video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
pub struct WatchedVideo {
    pub video_id: String,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub title: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub watched_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_media_record_accepts_numeric_id_and_null_arrays() {
        let record: MediaRecord = serde_json::from_value(json!({
            "id": 17,
            "title": "Arrival (2016)",
            "status": "Done",
            "monthly_tracking": null,
            "related_notion_page_ids": null,
        }))
        .unwrap();

        assert_eq!(record.id, "17");
        assert!(record.monthly_tracking.is_empty());
        assert!(record.related_notion_page_ids.is_empty());
        assert_eq!(record.category, None);
    }

    #[test]
    fn test_media_record_null_title_becomes_empty() {
        let record: MediaRecord =
            serde_json::from_value(json!({"id": "a", "title": null})).unwrap();
        assert_eq!(record.title, "");
    }

    #[test]
    fn test_apply_patch_returns_new_copy() {
        let original = MediaRecord::new("1", "Dune").with_status("To-do");
        let patch = MediaPatch {
            status: Some("Done".into()),
            rating: Some(4.5),
            ..Default::default()
        };

        let edited = original.apply_patch(&patch);

        assert_eq!(original.status.as_deref(), Some("To-do"));
        assert_eq!(edited.status.as_deref(), Some("Done"));
        assert_eq!(edited.rating, Some(4.5));
        assert_eq!(edited.title, "Dune");
    }

    #[test]
    fn test_media_patch_is_empty() {
        assert!(MediaPatch::default().is_empty());
        let patch = MediaPatch {
            title: Some("x".into()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_habit_with_days_sorts_and_dedups() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let habit = Habit::new("h1", "Read").with_days([
            d("2024-03-02"),
            d("2024-03-01"),
            d("2024-03-02"),
        ]);
        assert_eq!(habit.completed_days, vec![d("2024-03-01"), d("2024-03-02")]);
        assert!(habit.is_done_on(d("2024-03-01")));
        assert!(!habit.is_done_on(d("2024-03-03")));
    }

    #[test]
    fn test_metric_from_str() {
        assert_eq!("resting_heart_rate".parse::<Metric>(), Ok(Metric::RestingHeartRate));
        assert_eq!("Resting-Heart-Rate".parse::<Metric>(), Ok(Metric::RestingHeartRate));
        assert_eq!("steps".parse::<Metric>(), Ok(Metric::Steps));
        assert!("mood".parse::<Metric>().is_err());
    }

    #[test]
    fn test_metric_value_extraction() {
        let mut entry = TrackingEntry::new("1", "Day");
        entry.weight = Some(71.2);
        assert_eq!(Metric::Weight.value(&entry), Some(71.2));
        assert_eq!(Metric::Steps.value(&entry), None);
    }

    #[test]
    fn test_calendar_event_camel_case() {
        let event = CalendarEvent {
            id: "e1".into(),
            summary: "Dentist".into(),
            description: None,
            start: "2024-03-01".into(),
            end: "2024-03-02".into(),
            location: None,
            all_day: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"allDay\":true"));
        assert!(!json.contains("description"));
    }
}
