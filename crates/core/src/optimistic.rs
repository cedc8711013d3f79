// crates/core/src/optimistic.rs
//! Optimistic mutations: apply locally, send the request, roll back on
//! failure.
//!
//! - [`Optimistic`] is a single value with explicit pending / confirmed /
//!   rollback states.
//! - [`optimistic_mutation`] sequences apply → request → revert.
//! - [`RecordCache`] keeps one [`Optimistic`] per record id.
//! - [`KeyedMutationQueue`] serializes mutations on the same id, so two rapid
//!   toggles on one record resolve in arrival order.

use std::future::Future;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A value that may have an unconfirmed local edit in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Optimistic<T> {
    confirmed: T,
    pending: Option<T>,
    rollback: Option<T>,
}

impl<T: Clone> Optimistic<T> {
    pub fn new(value: T) -> Self {
        Self {
            confirmed: value,
            pending: None,
            rollback: None,
        }
    }

    /// What the UI should show: the pending edit if any, else the confirmed value.
    pub fn current(&self) -> &T {
        self.pending.as_ref().unwrap_or(&self.confirmed)
    }

    pub fn confirmed(&self) -> &T {
        &self.confirmed
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Start an edit. The value visible right now becomes the rollback value.
    pub fn begin(&mut self, apply: impl FnOnce(&T) -> T) -> &T {
        let before = self.current().clone();
        let next = apply(&before);
        self.rollback = Some(before);
        self.pending.insert(next)
    }

    /// The server accepted the edit; its value becomes the confirmed one.
    pub fn commit(&mut self, value: T) {
        self.confirmed = value;
        self.pending = None;
        self.rollback = None;
    }

    /// Drop the pending edit and restore the rollback value.
    pub fn revert(&mut self) {
        self.pending = None;
        if let Some(before) = self.rollback.take() {
            self.confirmed = before;
        }
    }
}

/// Run `apply_locally`, await `request`, and call `revert` if it fails.
///
/// The request's error is returned unchanged after reverting.
pub async fn optimistic_mutation<R, E, Fut>(
    apply_locally: impl FnOnce(),
    request: Fut,
    revert: impl FnOnce(&E),
) -> Result<R, E>
where
    Fut: Future<Output = Result<R, E>>,
{
    apply_locally();
    match request.await {
        Ok(value) => Ok(value),
        Err(e) => {
            revert(&e);
            Err(e)
        }
    }
}

/// Records addressable by a stable identifier.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for crate::types::MediaRecord {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for crate::types::Habit {
    fn key(&self) -> &str {
        &self.id
    }
}

/// In-memory copy of the last fetched collection with per-record
/// optimistic state. `None` inside an entry marks a pending deletion.
///
/// Uses `std::sync::RwLock`; the lock is never held across an `.await`.
pub struct RecordCache<T> {
    entries: RwLock<Option<Vec<(String, Optimistic<Option<T>>)>>>,
}

impl<T> Default for RecordCache<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(None),
        }
    }
}

impl<T: Keyed + Clone> RecordCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection with a fresh fetch.
    pub fn replace(&self, records: Vec<T>) {
        let entries = records
            .into_iter()
            .map(|r| (r.key().to_string(), Optimistic::new(Some(r))))
            .collect();
        *self.write() = Some(entries);
    }

    /// Whether a collection has been fetched yet.
    pub fn is_loaded(&self) -> bool {
        self.read().is_some()
    }

    /// Visible records (pending edits applied, pending deletions hidden).
    pub fn snapshot(&self) -> Option<Vec<T>> {
        self.read().as_ref().map(|entries| {
            entries
                .iter()
                .filter_map(|(_, cell)| cell.current().clone())
                .collect()
        })
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.read()
            .as_ref()?
            .iter()
            .find(|(key, _)| key == id)
            .and_then(|(_, cell)| cell.current().clone())
    }

    /// Apply a local edit to `id`. Returns `false` when the record is not cached.
    pub fn begin_update(&self, id: &str, apply: impl FnOnce(&T) -> T) -> bool {
        self.with_entry(id, |cell| {
            cell.begin(|current| current.as_ref().map(apply));
        })
    }

    /// Hide `id` until the deletion is committed or reverted.
    pub fn begin_remove(&self, id: &str) -> bool {
        self.with_entry(id, |cell| {
            cell.begin(|_| None);
        })
    }

    /// Add a record created upstream (already confirmed).
    pub fn insert(&self, record: T) {
        if let Some(entries) = self.write().as_mut() {
            let key = record.key().to_string();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, cell)) => cell.commit(Some(record)),
                None => entries.insert(0, (key, Optimistic::new(Some(record)))),
            }
        }
    }

    /// Confirm the pending edit on `id` with the server's value. Committing
    /// `None` drops the entry.
    pub fn commit(&self, id: &str, value: Option<T>) {
        let mut guard = self.write();
        if let Some(entries) = guard.as_mut() {
            if let Some(pos) = entries.iter().position(|(k, _)| k == id) {
                match value {
                    Some(v) => entries[pos].1.commit(Some(v)),
                    None => {
                        entries.remove(pos);
                    }
                }
            }
        }
    }

    /// Roll back the pending edit on `id`.
    pub fn revert(&self, id: &str) {
        self.with_entry(id, Optimistic::revert);
    }

    fn with_entry(&self, id: &str, f: impl FnOnce(&mut Optimistic<Option<T>>)) -> bool {
        let mut guard = self.write();
        let Some(entries) = guard.as_mut() else {
            return false;
        };
        match entries.iter_mut().find(|(k, _)| k == id) {
            Some((_, cell)) => {
                f(cell);
                true
            }
            None => false,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Vec<(String, Optimistic<Option<T>>)>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Vec<(String, Optimistic<Option<T>>)>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-identifier async mutex. Mutations on the same id run one at a time in
/// arrival order (tokio's mutex is FIFO); different ids do not block each
/// other.
#[derive(Default)]
pub struct KeyedMutationQueue {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedMutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> MutationPermit {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        MutationPermit {
            key: key.to_string(),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Number of ids with a mutation queued or running.
    pub fn active(&self) -> usize {
        self.locks.len()
    }
}

/// Held while a mutation on one id runs. Dropping it admits the next one.
pub struct MutationPermit {
    key: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl MutationPermit {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for MutationPermit {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map holds the mutex now: nobody is waiting on this id.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
