// crates/core/src/clustering.rs
//! Related-item clustering.
//!
//! Records that reference each other (directly or through a chain of
//! references) collapse into one display unit. Connected components are found
//! with an explicit stack so deep reference chains cannot overflow.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::types::MediaRecord;

/// Something that can take part in related-item clustering.
pub trait Relatable {
    /// Native identifier other records reference.
    fn native_id(&self) -> Option<&str>;
    /// Identifiers this record references.
    fn related_ids(&self) -> &[String];
    /// Sortable attribute used to order members inside a cluster.
    fn cluster_sort_key(&self) -> Option<i64>;
}

impl Relatable for MediaRecord {
    fn native_id(&self) -> Option<&str> {
        self.notion_page_id.as_deref()
    }

    fn related_ids(&self) -> &[String] {
        &self.related_notion_page_ids
    }

    fn cluster_sort_key(&self) -> Option<i64> {
        extract_year(&self.title).map(i64::from)
    }
}

/// Year from a bracketed title suffix: `"Dune (2021)"`, `"Dune [2021]"`.
pub fn extract_year(title: &str) -> Option<i32> {
    static YEAR_SUFFIX: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = YEAR_SUFFIX
        .get_or_init(|| Regex::new(r"[\(\[]\s*(\d{4})\s*[\)\]]\s*$").ok())
        .as_ref()?;
    regex
        .captures(title)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// One entry in a clustered list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayUnit<T> {
    Single { item: T },
    Cluster { items: Vec<T> },
}

impl<T> DisplayUnit<T> {
    pub fn len(&self) -> usize {
        match self {
            DisplayUnit::Single { .. } => 1,
            DisplayUnit::Cluster { items } => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn items(&self) -> Vec<&T> {
        match self {
            DisplayUnit::Single { item } => vec![item],
            DisplayUnit::Cluster { items } => items.iter().collect(),
        }
    }
}

/// Connected components over the reference graph, as lists of indices.
///
/// Components are ordered by their first member's position; members inside a
/// component are in original order. References to ids outside `items` are
/// ignored.
pub fn connected_components<T: Relatable>(items: &[T]) -> Vec<Vec<usize>> {
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    for (idx, item) in items.iter().enumerate() {
        if let Some(id) = item.native_id() {
            by_id.entry(id).or_insert(idx);
        }
    }

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    for (idx, item) in items.iter().enumerate() {
        for related in item.related_ids() {
            if let Some(&other) = by_id.get(related.as_str()) {
                if other != idx {
                    adjacency[idx].push(other);
                    adjacency[other].push(idx);
                }
            }
        }
    }

    let mut visited = vec![false; items.len()];
    let mut components = Vec::new();
    for start in 0..items.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let mut members = Vec::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            members.push(node);
            for &next in &adjacency[node] {
                if !visited[next] {
                    visited[next] = true;
                    stack.push(next);
                }
            }
        }
        members.sort_unstable();
        components.push(members);
    }
    components
}

/// Collapse related items into display units, preserving list order.
pub fn cluster<T: Relatable>(items: Vec<T>) -> Vec<DisplayUnit<T>> {
    let components = connected_components(&items);
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();

    components
        .into_iter()
        .filter_map(|members| {
            let mut taken: Vec<T> = members.iter().filter_map(|&i| slots[i].take()).collect();
            match taken.len() {
                0 => None,
                1 => taken.pop().map(|item| DisplayUnit::Single { item }),
                _ => {
                    // Keyed members ascending, unkeyed after; stable, so
                    // unkeyed members keep their relative order.
                    taken.sort_by_key(|item| match item.cluster_sort_key() {
                        Some(key) => (0, key),
                        None => (1, 0),
                    });
                    Some(DisplayUnit::Cluster { items: taken })
                }
            }
        })
        .collect()
}
