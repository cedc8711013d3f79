// crates/core/src/board.rs
//! The media board: filter, group, cluster, annotate with collapse state.

use serde::Serialize;

use crate::clustering::{cluster, DisplayUnit};
use crate::grouping::{group_media, GroupBody, MediaFilter, MediaGroupOptions};
use crate::preferences::Preferences;
use crate::types::MediaRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardGroup {
    pub key: String,
    pub collapsed: bool,
    /// Records in the group, counting every member of every cluster.
    pub count: usize,
    pub body: GroupBody<DisplayUnit<MediaRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaBoard {
    pub groups: Vec<BoardGroup>,
}

impl MediaBoard {
    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.count).sum()
    }
}

/// Build the board for `records`.
///
/// `group_done_by_month` overrides the stored toggle when given.
pub fn build_board(
    records: &[MediaRecord],
    filter: &MediaFilter,
    preferences: &Preferences,
    group_done_by_month: Option<bool>,
) -> MediaBoard {
    let options = MediaGroupOptions {
        group_done_by_month: group_done_by_month
            .unwrap_or_else(|| preferences.group_done_by_month()),
    };
    let filtered = filter.apply(records);

    let groups = group_media(&filtered, records, options)
        .into_iter()
        .map(|group| {
            let count = group.body.len();
            BoardGroup {
                collapsed: preferences.is_collapsed(&group.key),
                key: group.key,
                count,
                body: group.body.map_leaves(cluster),
            }
        })
        .collect();

    MediaBoard { groups }
}
