//! Process-wide result cache keyed by [`QueryKey`].
//!
//! Each key owns a `tokio::sync::watch` slot. Writers replace or modify the
//! entry inside the slot in one step, so readers (and subscribed views) only
//! ever see whole entries, and every change wakes the subscribers of that key.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::models::book::BookPage;
use crate::query::error::CatalogError;
use crate::query::key::QueryKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    key: QueryKey,
    status: CacheStatus,
    data: Option<Arc<BookPage>>,
    error: Option<CatalogError>,
    last_updated: DateTime<Utc>,
    stale: bool,
    seq: u64,
}

impl CacheEntry {
    /// A fresh entry for a key whose first request (`seq`) is about to be issued.
    #[must_use]
    pub fn pending(key: QueryKey, seq: u64) -> Self {
        Self {
            key,
            status: CacheStatus::Pending,
            data: None,
            error: None,
            last_updated: Utc::now(),
            stale: false,
            seq,
        }
    }

    /// A settled entry holding `page`.
    #[must_use]
    pub fn success(key: QueryKey, page: BookPage) -> Self {
        Self {
            key,
            status: CacheStatus::Success,
            data: Some(Arc::new(page)),
            error: None,
            last_updated: Utc::now(),
            stale: false,
            seq: 0,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    #[must_use]
    pub const fn status(&self) -> CacheStatus {
        self.status
    }

    #[must_use]
    pub fn data(&self) -> Option<&BookPage> {
        self.data.as_deref()
    }

    #[must_use]
    pub const fn error(&self) -> Option<&CatalogError> {
        self.error.as_ref()
    }

    #[must_use]
    pub const fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.stale
    }

    /// Issue-sequence number of the most recent request for this key.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, CacheStatus::Pending)
    }

    /// Failed refresh with older successful data still on display.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self.status, CacheStatus::Error) && self.data.is_some()
    }

    /// Stale and failed entries are always eligible for another request.
    #[must_use]
    pub const fn needs_fetch(&self) -> bool {
        self.stale || matches!(self.status, CacheStatus::Error)
    }

    /// Re-enters `Pending` for request `seq`, keeping any previous data readable.
    pub(crate) fn begin(&mut self, seq: u64) {
        self.status = CacheStatus::Pending;
        self.stale = false;
        self.seq = seq;
        self.last_updated = Utc::now();
    }

    /// Applies the outcome of request `seq`. Returns `false` (and leaves the
    /// entry untouched) when a newer request has been issued since.
    pub(crate) fn complete(&mut self, seq: u64, result: Result<BookPage, CatalogError>) -> bool {
        if seq != self.seq {
            return false;
        }

        match result {
            Ok(page) => {
                self.status = CacheStatus::Success;
                self.data = Some(Arc::new(page));
                self.error = None;
            }
            Err(err) => {
                self.status = CacheStatus::Error;
                self.error = Some(err);
            }
        }
        self.last_updated = Utc::now();
        true
    }

    pub(crate) const fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub(crate) const fn shared_data(&self) -> Option<&Arc<BookPage>> {
        self.data.as_ref()
    }

    /// Swaps in `data` without touching status or timestamps.
    pub(crate) fn replace_data(&mut self, data: Arc<BookPage>) {
        self.data = Some(data);
    }
}

/// Shared map from query key to its current [`CacheEntry`].
///
/// Unbounded unless constructed with a `max_entries` limit, in which case the
/// least recently updated settled entry is evicted to make room.
#[derive(Debug, Default)]
pub struct ResultCache {
    slots: RwLock<HashMap<QueryKey, watch::Sender<CacheEntry>>>,
    max_entries: usize,
}

impl ResultCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `max_entries == 0` disables eviction.
    #[must_use]
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            slots: RwLock::default(),
            max_entries,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<QueryKey, watch::Sender<CacheEntry>>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<QueryKey, watch::Sender<CacheEntry>>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.read().get(key).map(|slot| slot.borrow().clone())
    }

    /// Entry to render for `key`.
    ///
    /// While `key` has no data yet (first request still pending, or failed),
    /// the entry of `previous` is returned instead if it has data, so the last
    /// rendered page stays on screen. Callers detect the fallback by comparing
    /// [`CacheEntry::key`] with the key they asked for.
    #[must_use]
    pub fn get_or_previous(&self, key: &QueryKey, previous: Option<&QueryKey>) -> Option<CacheEntry> {
        let slots = self.read();
        let current = slots.get(key).map(|slot| slot.borrow().clone());

        if current.as_ref().is_some_and(|entry| entry.data.is_some()) {
            return current;
        }

        let fallback = previous
            .filter(|prev| *prev != key)
            .and_then(|prev| slots.get(prev))
            .map(|slot| slot.borrow().clone())
            .filter(|entry| entry.data.is_some());

        fallback.or(current)
    }

    /// Inserts `entry` or replaces the entry for its key, notifying subscribers.
    pub fn put(&self, entry: CacheEntry) {
        let mut slots = self.write();
        if let Some(slot) = slots.get(&entry.key) {
            slot.send_replace(entry);
            return;
        }

        self.make_room(&mut slots);
        let key = entry.key.clone();
        let (tx, _rx) = watch::channel(entry);
        slots.insert(key, tx);
    }

    /// Watches the entry for `key`; `None` when the key has never been cached.
    #[must_use]
    pub fn subscribe(&self, key: &QueryKey) -> Option<watch::Receiver<CacheEntry>> {
        self.read().get(key).map(watch::Sender::subscribe)
    }

    /// Atomically modifies the entry for `key`. `f` returns whether it changed
    /// anything; subscribers are only woken when it did.
    pub(crate) fn update(&self, key: &QueryKey, f: impl FnOnce(&mut CacheEntry) -> bool) -> bool {
        self.read()
            .get(key)
            .is_some_and(|slot| slot.send_if_modified(f))
    }

    /// Inserts a pending entry for `key` or moves the existing one back to
    /// pending for request `seq`, unless `keep` says the current entry should
    /// be left alone. Returns whether the caller must issue request `seq`,
    /// together with a receiver watching the entry.
    pub(crate) fn begin_unless(
        &self,
        key: &QueryKey,
        seq: u64,
        keep: impl FnOnce(&CacheEntry) -> bool,
    ) -> (bool, watch::Receiver<CacheEntry>) {
        let mut slots = self.write();

        if let Some(slot) = slots.get(key) {
            let issued = slot.send_if_modified(|entry| {
                if keep(entry) {
                    return false;
                }
                entry.begin(seq);
                true
            });
            return (issued, slot.subscribe());
        }

        self.make_room(&mut slots);
        let (tx, rx) = watch::channel(CacheEntry::pending(key.clone(), seq));
        slots.insert(key.clone(), tx);
        (true, rx)
    }

    /// Marks every entry matching `predicate` stale. Stale data may still be
    /// rendered but the next access re-fetches it.
    pub fn invalidate(&self, predicate: impl Fn(&CacheEntry) -> bool) -> usize {
        let slots = self.read();
        let mut count = 0;

        for slot in slots.values() {
            let marked = slot.send_if_modified(|entry| {
                if entry.stale || !predicate(entry) {
                    return false;
                }
                entry.mark_stale();
                true
            });
            if marked {
                count += 1;
            }
        }

        debug!(count, "Invalidated cache entries");
        count
    }

    /// Removes every entry matching `predicate`. Subscribers of a removed key
    /// see their channel close.
    pub fn evict(&self, predicate: impl Fn(&CacheEntry) -> bool) -> usize {
        let mut slots = self.write();
        let before = slots.len();
        slots.retain(|_, slot| !predicate(&slot.borrow()));
        before - slots.len()
    }

    /// Snapshot of every entry matching `predicate`.
    #[must_use]
    pub fn entries(&self, predicate: impl Fn(&CacheEntry) -> bool) -> Vec<CacheEntry> {
        self.read()
            .values()
            .map(|slot| slot.borrow().clone())
            .filter(|entry| predicate(entry))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn make_room(&self, slots: &mut HashMap<QueryKey, watch::Sender<CacheEntry>>) {
        if self.max_entries == 0 || slots.len() < self.max_entries {
            return;
        }

        let oldest = slots
            .iter()
            .filter(|(_, slot)| !slot.borrow().is_pending())
            .min_by_key(|(_, slot)| slot.borrow().last_updated)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            debug!(key = %key, "Evicting least recently updated cache entry");
            slots.remove(&key);
        }
    }
}
