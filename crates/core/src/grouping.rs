// crates/core/src/grouping.rs
//! Grouping engine: partition a flat record list into keyed groups.
//!
//! Groups are one or two levels deep (`status → category → records`). Every
//! input record lands in exactly one leaf; records whose key is missing fall
//! into a sentinel group instead of being dropped. Membership is recomputed
//! from scratch on every call.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate};
use serde::Serialize;

use crate::types::MediaRecord;

pub const NO_STATUS: &str = "No Status";
pub const NO_MONTH: &str = "No Month";
pub const NO_CATEGORY: &str = "Other";

pub const STATUS_IN_PROGRESS: &str = "In progress";
pub const STATUS_TODO: &str = "To-do";
pub const STATUS_DONE: &str = "Done";

/// Categories that always get a bucket under "To-do".
pub const TODO_BUCKETS: &[&str] = &["Movies", "Series"];

/// A leaf bucket inside a nested group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket<T> {
    pub key: String,
    pub items: Vec<T>,
}

/// Contents of a primary group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum GroupBody<T> {
    Flat(Vec<T>),
    Nested(Vec<Bucket<T>>),
}

impl<T> GroupBody<T> {
    /// Number of records across all leaves.
    pub fn len(&self) -> usize {
        match self {
            GroupBody::Flat(items) => items.len(),
            GroupBody::Nested(buckets) => buckets.iter().map(|b| b.items.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transform every leaf list, keeping the group structure.
    pub fn map_leaves<U>(self, mut f: impl FnMut(Vec<T>) -> Vec<U>) -> GroupBody<U> {
        match self {
            GroupBody::Flat(items) => GroupBody::Flat(f(items)),
            GroupBody::Nested(buckets) => GroupBody::Nested(
                buckets
                    .into_iter()
                    .map(|b| Bucket {
                        key: b.key,
                        items: f(b.items),
                    })
                    .collect(),
            ),
        }
    }
}

/// A primary group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group<T> {
    pub key: String,
    pub body: GroupBody<T>,
}

type KeyFn<'a, T> = Box<dyn Fn(&T) -> Option<String> + 'a>;
type SecondaryKeyFn<'a, T> = Box<dyn Fn(&str, &T) -> Option<String> + 'a>;
type ExpectedFn<'a> = Box<dyn Fn(&str) -> Vec<String> + 'a>;
type SentinelFn<'a> = Box<dyn Fn(&str) -> String + 'a>;
type BucketOrderFn<'a> = Box<dyn Fn(&str, &str, &str) -> Ordering + 'a>;

struct Secondary<'a, T> {
    key: SecondaryKeyFn<'a, T>,
    sentinel: SentinelFn<'a>,
    expected: ExpectedFn<'a>,
    order: Option<BucketOrderFn<'a>>,
}

/// Configurable two-level grouper.
///
/// ```ignore
/// let groups = Grouper::new(|r: &Rec| r.status.clone(), "No Status")
///     .priority(["To-do", "Done"])
///     .secondary(|_, r| r.category.clone(), |_| "Other".into())
///     .group(records);
/// ```
pub struct Grouper<'a, T> {
    primary: KeyFn<'a, T>,
    sentinel: String,
    priority: Vec<String>,
    always_present: Vec<String>,
    secondary: Option<Secondary<'a, T>>,
}

impl<'a, T> Grouper<'a, T> {
    pub fn new(primary: impl Fn(&T) -> Option<String> + 'a, sentinel: impl Into<String>) -> Self {
        Self {
            primary: Box::new(primary),
            sentinel: sentinel.into(),
            priority: Vec::new(),
            always_present: Vec::new(),
            secondary: None,
        }
    }

    /// Fixed order for primary keys. Keys not listed sort after these, in
    /// first-seen order.
    pub fn priority<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Primary groups that exist even when no record maps to them.
    pub fn always_present<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.always_present = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Enable the second level. `key` receives the primary key so different
    /// groups can bucket by different attributes.
    pub fn secondary(
        mut self,
        key: impl Fn(&str, &T) -> Option<String> + 'a,
        sentinel: impl Fn(&str) -> String + 'a,
    ) -> Self {
        self.secondary = Some(Secondary {
            key: Box::new(key),
            sentinel: Box::new(sentinel),
            expected: Box::new(|_| Vec::new()),
            order: None,
        });
        self
    }

    /// Buckets materialized (possibly empty) under each primary key.
    /// Ignored unless [`Grouper::secondary`] was called first.
    pub fn expected_buckets(mut self, expected: impl Fn(&str) -> Vec<String> + 'a) -> Self {
        if let Some(secondary) = self.secondary.as_mut() {
            secondary.expected = Box::new(expected);
        }
        self
    }

    /// Stable ordering for buckets, given `(primary, a, b)`. Without it
    /// buckets keep expected-then-first-seen order.
    pub fn bucket_order(mut self, order: impl Fn(&str, &str, &str) -> Ordering + 'a) -> Self {
        if let Some(secondary) = self.secondary.as_mut() {
            secondary.order = Some(Box::new(order));
        }
        self
    }

    pub fn group(&self, items: impl IntoIterator<Item = T>) -> Vec<Group<T>> {
        let mut groups: Vec<(String, Vec<T>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for key in &self.always_present {
            if !index.contains_key(key) {
                index.insert(key.clone(), groups.len());
                groups.push((key.clone(), Vec::new()));
            }
        }

        for item in items {
            let key = non_empty((self.primary)(&item)).unwrap_or_else(|| self.sentinel.clone());
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                groups.push((key, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(item);
        }

        let rank = |key: &str| {
            self.priority
                .iter()
                .position(|p| p == key)
                .unwrap_or(usize::MAX)
        };
        // Stable: unprioritized keys keep first-seen order.
        groups.sort_by_key(|(key, _)| rank(key));

        groups
            .into_iter()
            .map(|(key, items)| {
                let body = match &self.secondary {
                    None => GroupBody::Flat(items),
                    Some(secondary) => GroupBody::Nested(bucketize(&key, items, secondary)),
                };
                Group { key, body }
            })
            .collect()
    }
}

fn bucketize<T>(primary: &str, items: Vec<T>, secondary: &Secondary<'_, T>) -> Vec<Bucket<T>> {
    let mut buckets: Vec<Bucket<T>> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for key in (secondary.expected)(primary) {
        if !index.contains_key(&key) {
            index.insert(key.clone(), buckets.len());
            buckets.push(Bucket {
                key,
                items: Vec::new(),
            });
        }
    }

    for item in items {
        let key = non_empty((secondary.key)(primary, &item))
            .unwrap_or_else(|| (secondary.sentinel)(primary));
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            buckets.push(Bucket {
                key,
                items: Vec::new(),
            });
            buckets.len() - 1
        });
        buckets[slot].items.push(item);
    }

    if let Some(order) = &secondary.order {
        buckets.sort_by(|a, b| order(primary, &a.key, &b.key));
    }
    buckets
}

fn non_empty(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

// ============================================================================
// Media specialization
// ============================================================================

/// Normalize a raw status. "Not started" is the Notion default and means
/// the same thing as "To-do".
pub fn normalize_status(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let canonical = match trimmed.to_ascii_lowercase().as_str() {
        "not started" | "to-do" | "todo" | "to do" => STATUS_TODO,
        "in progress" | "in-progress" | "watching" | "reading" => STATUS_IN_PROGRESS,
        "done" | "completed" | "finished" => STATUS_DONE,
        _ => return Some(trimmed.to_string()),
    };
    Some(canonical.to_string())
}

/// Parse a stored timestamp (`RFC 3339` or a leading `YYYY-MM-DD`).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    raw.get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
}

/// Month label ("March 2024") used for Done-by-month grouping.
///
/// The latest tracked month wins; otherwise the creation date is used.
pub fn month_label(record: &MediaRecord) -> Option<String> {
    if let Some(latest) = record
        .monthly_tracking
        .iter()
        .rev()
        .find(|m| !m.trim().is_empty())
    {
        return Some(latest.trim().to_string());
    }
    let created = parse_date(record.created.as_deref()?)?;
    Some(created.format("%B %Y").to_string())
}

/// Parse a "March 2024" label back to the first of that month.
pub fn parse_month_label(label: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("1 {}", label.trim()), "%d %B %Y").ok()
}

/// Newest month first; unparseable labels after, in first-seen order;
/// the "No Month" sentinel last.
pub fn compare_month_labels(a: &str, b: &str) -> Ordering {
    fn rank(label: &str) -> (u8, Option<std::cmp::Reverse<NaiveDate>>) {
        if label == NO_MONTH {
            return (2, None);
        }
        match parse_month_label(label) {
            Some(date) => (0, Some(std::cmp::Reverse(date))),
            None => (1, None),
        }
    }
    rank(a).cmp(&rank(b))
}

/// Options for the media board grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaGroupOptions {
    /// Bucket the Done group by month instead of by category.
    pub group_done_by_month: bool,
}

/// Group media by normalized status, then by category (or month for Done).
///
/// `history` is the unfiltered collection; with month grouping active every
/// month that has a Done record anywhere in history gets a bucket, so the UI
/// can show an empty placeholder for months the current filter hides.
pub fn group_media(
    filtered: &[MediaRecord],
    history: &[MediaRecord],
    options: MediaGroupOptions,
) -> Vec<Group<MediaRecord>> {
    let history_months: Vec<String> = if options.group_done_by_month {
        let mut seen = Vec::new();
        for record in history {
            if normalize_status(record.status.as_deref()).as_deref() != Some(STATUS_DONE) {
                continue;
            }
            let label = month_label(record).unwrap_or_else(|| NO_MONTH.to_string());
            if !seen.contains(&label) {
                seen.push(label);
            }
        }
        seen
    } else {
        Vec::new()
    };

    let by_month = move |primary: &str| options.group_done_by_month && primary == STATUS_DONE;

    Grouper::new(
        |r: &MediaRecord| normalize_status(r.status.as_deref()),
        NO_STATUS,
    )
    .priority([STATUS_IN_PROGRESS, STATUS_TODO, STATUS_DONE])
    .always_present([STATUS_TODO])
    .secondary(
        move |primary, r: &MediaRecord| {
            if by_month(primary) {
                month_label(r)
            } else {
                r.category.clone()
            }
        },
        move |primary| {
            if by_month(primary) {
                NO_MONTH.to_string()
            } else {
                NO_CATEGORY.to_string()
            }
        },
    )
    .expected_buckets(move |primary| {
        if primary == STATUS_TODO {
            TODO_BUCKETS.iter().map(|s| s.to_string()).collect()
        } else if by_month(primary) {
            history_months.clone()
        } else {
            Vec::new()
        }
    })
    .bucket_order(move |primary, a, b| {
        if by_month(primary) {
            compare_month_labels(a, b)
        } else {
            Ordering::Equal
        }
    })
    .group(filtered.iter().cloned())
}

/// Filter applied before grouping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

impl MediaFilter {
    pub fn matches(&self, record: &MediaRecord) -> bool {
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            let record_category = record.category.as_deref().unwrap_or_default();
            if !record_category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !record
                .title
                .to_lowercase()
                .contains(&search.to_lowercase())
            {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, records: &[MediaRecord]) -> Vec<MediaRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn keys<T>(groups: &[Group<T>]) -> Vec<&str> {
        groups.iter().map(|g| g.key.as_str()).collect()
    }

    fn bucket_keys<T>(group: &Group<T>) -> Vec<&str> {
        match &group.body {
            GroupBody::Nested(b) => b.iter().map(|b| b.key.as_str()).collect(),
            GroupBody::Flat(_) => panic!("expected nested group"),
        }
    }

    fn bucket<'g>(group: &'g Group<MediaRecord>, key: &str) -> &'g Bucket<MediaRecord> {
        match &group.body {
            GroupBody::Nested(b) => b.iter().find(|b| b.key == key).unwrap(),
            GroupBody::Flat(_) => panic!("expected nested group"),
        }
    }

    fn find<'g>(groups: &'g [Group<MediaRecord>], key: &str) -> &'g Group<MediaRecord> {
        groups.iter().find(|g| g.key == key).unwrap()
    }

    #[test]
    fn test_flat_grouping_priority_then_first_seen() {
        let items = vec!["b:1", "z:2", "a:3", "y:4", "b:5"];
        let groups = Grouper::new(|s: &&str| s.split(':').next().map(String::from), "none")
            .priority(["a", "b"])
            .group(items);

        assert_eq!(keys(&groups), vec!["a", "b", "z", "y"]);
        assert_eq!(groups[1].body, GroupBody::Flat(vec!["b:1", "b:5"]));
    }

    #[test]
    fn test_missing_key_falls_back_to_sentinel() {
        let items = vec![Some("x"), None, Some("  ")];
        let groups = Grouper::new(|v: &Option<&str>| v.map(String::from), NO_STATUS).group(items);

        assert_eq!(keys(&groups), vec!["x", NO_STATUS]);
        assert_eq!(groups[1].body.len(), 2);
    }

    #[test]
    fn test_normalize_status() {
        assert_eq!(normalize_status(Some("Not started")).as_deref(), Some(STATUS_TODO));
        assert_eq!(normalize_status(Some("to-do")).as_deref(), Some(STATUS_TODO));
        assert_eq!(normalize_status(Some(" Done ")).as_deref(), Some(STATUS_DONE));
        assert_eq!(normalize_status(Some("Dropped")).as_deref(), Some("Dropped"));
        assert_eq!(normalize_status(Some("")), None);
        assert_eq!(normalize_status(None), None);
    }

    #[test]
    fn test_not_started_and_todo_share_group() {
        let records = vec![
            MediaRecord::new("1", "A").with_status("Not started").with_category("Movies"),
            MediaRecord::new("2", "B").with_status("To-do").with_category("Movies"),
        ];

        let groups = group_media(&records, &records, MediaGroupOptions::default());

        let todo_groups: Vec<_> = groups.iter().filter(|g| g.key == STATUS_TODO).collect();
        assert_eq!(todo_groups.len(), 1);
        assert_eq!(bucket(todo_groups[0], "Movies").items.len(), 2);
        assert_eq!(keys(&groups), vec![STATUS_TODO]);
    }

    #[test]
    fn test_todo_always_has_movie_and_series_buckets() {
        let records = vec![MediaRecord::new("1", "A").with_status("To-do").with_category("Books")];
        let groups = group_media(&records, &records, MediaGroupOptions::default());

        let todo = find(&groups, STATUS_TODO);
        assert_eq!(bucket_keys(todo), vec!["Movies", "Series", "Books"]);
        assert!(bucket(todo, "Movies").items.is_empty());
    }

    #[test]
    fn test_todo_materialized_without_records() {
        let records = vec![MediaRecord::new("1", "A").with_status("Done")];
        let groups = group_media(&records, &records, MediaGroupOptions::default());
        assert_eq!(keys(&groups), vec![STATUS_TODO, STATUS_DONE]);
        assert!(find(&groups, STATUS_TODO).body.is_empty());
    }

    #[test]
    fn test_done_by_month_preserves_empty_history_month() {
        let march = MediaRecord::new("1", "A").with_status("Done").with_category("Movies")
            .with_created("2024-03-10T12:00:00Z");
        let april = MediaRecord::new("2", "B").with_status("Done").with_category("Movies")
            .with_created("2024-04-02");
        let may = MediaRecord::new("3", "C").with_status("Done").with_category("Books")
            .with_created("2024-05-20");
        let history = vec![march.clone(), april.clone(), may];
        let filtered = vec![march, april];

        let groups = group_media(
            &filtered,
            &history,
            MediaGroupOptions { group_done_by_month: true },
        );

        let done = find(&groups, STATUS_DONE);
        assert_eq!(bucket_keys(done), vec!["May 2024", "April 2024", "March 2024"]);
        assert!(bucket(done, "May 2024").items.is_empty());
        assert_eq!(bucket(done, "March 2024").items[0].id, "1");
    }

    #[test]
    fn test_month_label_prefers_tracking() {
        let record = MediaRecord::new("1", "A")
            .with_created("2023-01-01")
            .with_monthly_tracking(&["January 2024", "February 2024"]);
        assert_eq!(month_label(&record).as_deref(), Some("February 2024"));

        let undated = MediaRecord::new("2", "B");
        assert_eq!(month_label(&undated), None);
    }

    #[test]
    fn test_done_without_date_goes_to_no_month_last() {
        let records = vec![
            MediaRecord::new("1", "A").with_status("Done"),
            MediaRecord::new("2", "B").with_status("Done").with_created("2024-01-05"),
        ];
        let groups = group_media(&records, &records, MediaGroupOptions { group_done_by_month: true });
        assert_eq!(bucket_keys(find(&groups, STATUS_DONE)), vec!["January 2024", NO_MONTH]);
    }

    #[test]
    fn test_missing_category_uses_sentinel() {
        let records = vec![MediaRecord::new("1", "A").with_status("In progress")];
        let groups = group_media(&records, &records, MediaGroupOptions::default());
        assert_eq!(bucket_keys(find(&groups, STATUS_IN_PROGRESS)), vec![NO_CATEGORY]);
    }

    #[test]
    fn test_compare_month_labels() {
        assert_eq!(compare_month_labels("May 2024", "March 2024"), Ordering::Less);
        assert_eq!(compare_month_labels(NO_MONTH, "March 2024"), Ordering::Greater);
        assert_eq!(compare_month_labels("garbage", "March 2024"), Ordering::Greater);
    }

    #[test]
    fn test_media_filter() {
        let records = vec![
            MediaRecord::new("1", "Dune (2021)").with_category("Movies"),
            MediaRecord::new("2", "Dune Messiah").with_category("Books"),
            MediaRecord::new("3", "Arrival").with_category("Movies"),
        ];
        let filter = MediaFilter {
            category: Some("movies".into()),
            search: Some("dune".into()),
        };
        let out = filter.apply(&records);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "1");

        assert_eq!(MediaFilter::default().apply(&records).len(), 3);
    }

    fn arb_record() -> impl Strategy<Value = MediaRecord> {
        let status = prop::option::of(prop::sample::select(vec![
            "Not started", "To-do", "In progress", "Done", "Dropped", "",
        ]));
        let category = prop::option::of(prop::sample::select(vec!["Movies", "Series", "Books"]));
        let created = prop::option::of(prop::sample::select(vec![
            "2024-01-02", "2024-03-04T10:00:00Z", "not a date",
        ]));
        (any::<u32>(), status, category, created).prop_map(|(id, s, c, d)| {
            let mut r = MediaRecord::new(id.to_string(), "t");
            r.status = s.map(String::from);
            r.category = c.map(String::from);
            r.created = d.map(String::from);
            r
        })
    }

    proptest! {
        #[test]
        fn prop_grouping_preserves_record_count(
            records in prop::collection::vec(arb_record(), 0..40),
            by_month in any::<bool>(),
            cut in 0usize..40,
        ) {
            let filtered: Vec<_> = records.iter().take(cut).cloned().collect();
            let groups = group_media(
                &filtered,
                &records,
                MediaGroupOptions { group_done_by_month: by_month },
            );
            let total: usize = groups.iter().map(|g| g.body.len()).sum();
            prop_assert_eq!(total, filtered.len());
        }
    }
}
