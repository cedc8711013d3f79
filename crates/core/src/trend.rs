// crates/core/src/trend.rs
//! Sparkline trend windows centred on one entry.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex_lite::Regex;
use serde::Serialize;

use crate::grouping::parse_date;
use crate::types::{Metric, TrackingEntry};

/// Points taken on each side of the focal entry.
pub const WINDOW_RADIUS: usize = 14;

/// A single sparkline point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub id: String,
    pub label: String,
    pub value: f64,
    pub is_focal: bool,
    pub is_future: bool,
}

/// Window of up to `2 * WINDOW_RADIUS + 1` points around a focal entry.
///
/// `history` ends with the focal point and `projection` starts with it, so a
/// renderer can draw both halves as separate line segments that meet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "codegen", derive(ts_rs::TS), ts(export, export_to = "../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct TrendWindow {
    pub points: Vec<TrendPoint>,
    pub focal_index: usize,
    pub history: Vec<TrendPoint>,
    pub projection: Vec<TrendPoint>,
}

/// Best-effort date recovered from free text.
///
/// Understands `2024-03-05`, `2024/03/05`, `March 5, 2024`, `Mar 5 2024`
/// and `5 March 2024`.
pub fn date_from_title(title: &str) -> Option<NaiveDate> {
    static ISO: OnceLock<Option<Regex>> = OnceLock::new();
    static MONTH_FIRST: OnceLock<Option<Regex>> = OnceLock::new();
    static DAY_FIRST: OnceLock<Option<Regex>> = OnceLock::new();

    let iso = ISO.get_or_init(|| Regex::new(r"(\d{4})[-/](\d{1,2})[-/](\d{1,2})").ok());
    if let Some(c) = iso.as_ref().and_then(|r| r.captures(title)) {
        let ymd = (
            c[1].parse::<i32>().ok(),
            c[2].parse::<u32>().ok(),
            c[3].parse::<u32>().ok(),
        );
        if let (Some(y), Some(m), Some(d)) = ymd {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                return Some(date);
            }
        }
    }

    let month_first = MONTH_FIRST
        .get_or_init(|| Regex::new(r"([A-Za-z]{3,9})\.?\s+(\d{1,2}),?\s+(\d{4})").ok());
    if let Some(c) = month_first.as_ref().and_then(|r| r.captures(title)) {
        if let Some(date) = parse_named(&c[1], &c[2], &c[3]) {
            return Some(date);
        }
    }

    let day_first =
        DAY_FIRST.get_or_init(|| Regex::new(r"(\d{1,2})\s+([A-Za-z]{3,9})\.?,?\s+(\d{4})").ok());
    if let Some(c) = day_first.as_ref().and_then(|r| r.captures(title)) {
        if let Some(date) = parse_named(&c[2], &c[1], &c[3]) {
            return Some(date);
        }
    }
    None
}

fn parse_named(month: &str, day: &str, year: &str) -> Option<NaiveDate> {
    let text = format!("{month} {day} {year}");
    NaiveDate::parse_from_str(&text, "%B %d %Y")
        .or_else(|_| NaiveDate::parse_from_str(&text, "%b %d %Y"))
        .ok()
}

/// Sort key: the explicit date, else a date found in the title, else empty
/// (undated entries compare lowest).
pub fn entry_date(entry: &TrackingEntry) -> Option<NaiveDate> {
    entry
        .date
        .as_deref()
        .and_then(parse_date)
        .or_else(|| date_from_title(&entry.title))
}

fn sort_key(entry: &TrackingEntry) -> String {
    entry_date(entry)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Index range `[start, end)` around `idx` in a list of `len` entries.
///
/// Up to `WINDOW_RADIUS` after; any shortfall after extends the before side.
pub fn window_bounds(idx: usize, len: usize) -> (usize, usize) {
    debug_assert!(idx < len);
    let after = WINDOW_RADIUS.min(len - 1 - idx);
    let shortfall = WINDOW_RADIUS - after;
    let before = (WINDOW_RADIUS + shortfall).min(idx);
    (idx - before, idx + after + 1)
}

/// Build the trend window for `focal_id`, or `None` when the focal entry is
/// missing, has no value for `metric`, or fewer than two valid points remain.
pub fn build_trend_window(
    focal_id: &str,
    entries: &[TrackingEntry],
    metric: Metric,
) -> Option<TrendWindow> {
    let mut sorted: Vec<(String, &TrackingEntry)> =
        entries.iter().map(|e| (sort_key(e), e)).collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let idx = sorted.iter().position(|(_, e)| e.id == focal_id)?;
    metric.value(sorted[idx].1)?;
    let (start, end) = window_bounds(idx, sorted.len());

    let mut points = Vec::with_capacity(end - start);
    let mut focal_index = None;
    for (pos, (_, entry)) in sorted[start..end].iter().enumerate() {
        let Some(value) = metric.value(entry) else {
            continue;
        };
        let absolute = start + pos;
        if absolute == idx {
            focal_index = Some(points.len());
        }
        points.push(TrendPoint {
            id: entry.id.clone(),
            label: point_label(entry),
            value,
            is_focal: absolute == idx,
            is_future: absolute > idx,
        });
    }

    let focal_index = focal_index?;
    if points.len() < 2 {
        return None;
    }

    Some(TrendWindow {
        history: points[..=focal_index].to_vec(),
        projection: points[focal_index..].to_vec(),
        focal_index,
        points,
    })
}

fn point_label(entry: &TrackingEntry) -> String {
    match entry_date(entry) {
        Some(date) => date.format("%b %-d").to_string(),
        None => entry.title.clone(),
    }
}
