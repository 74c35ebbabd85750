//! Applies record mutations to the cached pages of one entity.
//!
//! Deletes are optimistic: the record disappears from every cached page before
//! the server answers and comes back if the server refuses. Creates and
//! updates wait for the server and only then touch the cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::events::NotificationEvent;
use crate::domain::{BookId, EntityTag};
use crate::models::book::{Book, BookPage};
use crate::query::cache::{CacheEntry, ResultCache};
use crate::query::error::CatalogError;
use crate::query::key::QueryKey;
use crate::query::notifier::Notifier;
use crate::query::transport::CatalogTransport;

/// Result of a confirmed delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub id: BookId,
    /// Cached pages the record was removed from.
    pub touched_entries: usize,
    /// Entries of the entity marked stale afterwards.
    pub invalidated_entries: usize,
}

/// Where a record sat on one cached page before it was optimistically removed.
struct Removal {
    key: QueryKey,
    index: usize,
    book: Book,
    updated_at: DateTime<Utc>,
}

/// A cached page with every delete still awaiting the server applied on top.
struct PendingPage {
    /// Page data before any of the outstanding deletes.
    base: Arc<BookPage>,
    removed: Vec<BookId>,
    /// Data last written to the cache for this page.
    written: Arc<BookPage>,
}

impl PendingPage {
    fn new(base: &Arc<BookPage>) -> Self {
        Self {
            base: Arc::clone(base),
            removed: Vec::new(),
            written: Arc::clone(base),
        }
    }

    fn render(&self) -> Arc<BookPage> {
        if self.removed.is_empty() {
            return Arc::clone(&self.base);
        }

        let items: Vec<Book> = self
            .base
            .items
            .iter()
            .filter(|book| !self.removed.contains(&book.id))
            .cloned()
            .collect();
        let dropped = (self.base.items.len() - items.len()) as u64;
        Arc::new(BookPage::new(items, self.base.total_count.saturating_sub(dropped)))
    }

    /// Folds a confirmed delete into the base page.
    fn commit(&mut self, id: BookId) {
        self.removed.retain(|removed| *removed != id);
        if let Some(index) = self.base.position_of(id) {
            let mut base = BookPage::clone(&self.base);
            base.items.remove(index);
            base.total_count = base.total_count.saturating_sub(1);
            self.base = Arc::new(base);
        }
    }
}

pub struct MutationHook {
    cache: Arc<ResultCache>,
    transport: Arc<dyn CatalogTransport>,
    notifier: Arc<dyn Notifier>,
    entity: EntityTag,
    pending: Mutex<HashMap<QueryKey, PendingPage>>,
}

impl MutationHook {
    #[must_use]
    pub fn new(
        cache: Arc<ResultCache>,
        transport: Arc<dyn CatalogTransport>,
        notifier: Arc<dyn Notifier>,
        entity: EntityTag,
    ) -> Self {
        Self {
            cache,
            transport,
            notifier,
            entity,
            pending: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn entity(&self) -> &EntityTag {
        &self.entity
    }

    /// Deletes record `id`.
    ///
    /// The record is removed from every cached page of the entity, and each
    /// such page's total drops by one, before the request is sent. On success
    /// all entries of the entity are marked stale so later visits re-fetch
    /// accurate page boundaries. On failure every touched page gets its
    /// previous data back and the error is reported and returned.
    pub async fn delete_record(&self, id: BookId) -> Result<DeleteOutcome, CatalogError> {
        let removals = self.remove_optimistically(id);
        debug!(id = %id, touched = removals.len(), "Removed record optimistically");

        match self.transport.delete(id).await {
            Ok(()) => {
                self.commit(id, &removals);
                let invalidated = self.invalidate_entity();
                info!(id = %id, "Deleted book");
                metrics::counter!("libris_deletes_total", "outcome" => "success").increment(1);
                self.notifier.notify(NotificationEvent::BookDeleted { id });

                Ok(DeleteOutcome {
                    id,
                    touched_entries: removals.len(),
                    invalidated_entries: invalidated,
                })
            }
            Err(err) => {
                let restored = self.roll_back(id, &removals);
                warn!(id = %id, error = %err, restored, "Delete failed, restored record");
                metrics::counter!("libris_deletes_total", "outcome" => "error").increment(1);
                self.notifier.notify(NotificationEvent::BookDeleteFailed {
                    id,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Creates a record. The entity's entries are invalidated on success since
    /// every page boundary after the insertion point moves.
    pub async fn create_record(&self, book: &Book) -> Result<Book, CatalogError> {
        match self.transport.create(book).await {
            Ok(created) => {
                self.invalidate_entity();
                self.notifier.notify(NotificationEvent::BookSaved {
                    id: created.id,
                    title: created.title.clone(),
                });
                Ok(created)
            }
            Err(err) => {
                self.notify_failure("create", &book.title, &err);
                Err(err)
            }
        }
    }

    /// Updates a record. Cached copies are replaced with the server's version
    /// and the entity's entries are invalidated, since the edit may move the
    /// record under the active sort or filters.
    pub async fn update_record(&self, book: &Book) -> Result<Book, CatalogError> {
        match self.transport.update(book).await {
            Ok(updated) => {
                let patched = self.patch_cached_copies(&updated);
                debug!(id = %updated.id, patched, "Patched cached copies");
                self.invalidate_entity();
                self.notifier.notify(NotificationEvent::BookSaved {
                    id: updated.id,
                    title: updated.title.clone(),
                });
                Ok(updated)
            }
            Err(err) => {
                self.notify_failure("update", &book.title, &err);
                Err(err)
            }
        }
    }

    fn belongs_to_entity(&self, entry: &CacheEntry) -> bool {
        entry.key().entity() == &self.entity
    }

    fn entries_containing(&self, id: BookId) -> Vec<QueryKey> {
        self.cache
            .entries(|entry| {
                self.belongs_to_entity(entry) && entry.data().is_some_and(|page| page.contains(id))
            })
            .into_iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<QueryKey, PendingPage>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes `id` from every cached page holding it. Deletes that overlap on
    /// one page are tracked together so each can be undone on its own.
    fn remove_optimistically(&self, id: BookId) -> Vec<Removal> {
        let mut pending = self.pending();
        let mut removals = Vec::new();

        for key in self.entries_containing(id) {
            self.cache.update(&key, |entry| {
                let Some(current) = entry.shared_data() else {
                    return false;
                };
                let Some(index) = current.position_of(id) else {
                    return false;
                };
                let book = current.items[index].clone();

                let overlapping = pending
                    .get(&key)
                    .is_some_and(|page| Arc::ptr_eq(&page.written, current));
                if !overlapping {
                    pending.insert(key.clone(), PendingPage::new(current));
                }
                let Some(page) = pending.get_mut(&key) else {
                    return false;
                };
                page.removed.push(id);
                page.written = page.render();

                entry.replace_data(Arc::clone(&page.written));
                removals.push(Removal {
                    key: key.clone(),
                    index,
                    book,
                    updated_at: entry.last_updated(),
                });
                true
            });
        }

        removals
    }

    fn commit(&self, id: BookId, removals: &[Removal]) {
        let mut pending = self.pending();
        for removal in removals {
            if let Some(page) = pending.get_mut(&removal.key) {
                page.commit(id);
                if page.removed.is_empty() {
                    pending.remove(&removal.key);
                }
            }
        }
    }

    /// Puts `id` back on every page it was removed from.
    ///
    /// A page still showing what the outstanding deletes wrote is re-rendered
    /// from its base without `id`, which restores it exactly once no other
    /// delete is outstanding. A page the server answered for in the meantime
    /// is only marked stale. A page edited in place gets the record
    /// re-inserted at its old position and is marked stale.
    fn roll_back(&self, id: BookId, removals: &[Removal]) -> usize {
        let mut pending = self.pending();
        let mut restored = 0;

        for removal in removals {
            let mut page = pending.remove(&removal.key);
            let tracked = page.as_mut().is_some_and(|page| {
                let before = page.removed.len();
                page.removed.retain(|removed| *removed != id);
                page.removed.len() < before
            });

            let changed = self.cache.update(&removal.key, |entry| {
                if let Some(page) = page.as_mut().filter(|_| tracked) {
                    let untouched = entry
                        .shared_data()
                        .is_some_and(|current| Arc::ptr_eq(current, &page.written));
                    if untouched {
                        page.written = page.render();
                        entry.replace_data(Arc::clone(&page.written));
                        return true;
                    }
                }

                if entry.last_updated() != removal.updated_at {
                    let was_stale = entry.is_stale();
                    entry.mark_stale();
                    return !was_stale;
                }
                reinsert(entry, removal)
            });

            if let Some(page) = page.filter(|page| !page.removed.is_empty()) {
                pending.insert(removal.key.clone(), page);
            }
            if changed {
                restored += 1;
            }
        }

        restored
    }

    fn patch_cached_copies(&self, updated: &Book) -> usize {
        self.entries_containing(updated.id)
            .iter()
            .filter(|key| {
                self.cache.update(key, |entry| {
                    let Some(current) = entry.shared_data() else {
                        return false;
                    };
                    let Some(index) = current.position_of(updated.id) else {
                        return false;
                    };

                    let mut page = BookPage::clone(current);
                    page.items[index] = updated.clone();
                    entry.replace_data(Arc::new(page));
                    true
                })
            })
            .count()
    }

    fn invalidate_entity(&self) -> usize {
        self.cache.invalidate(|entry| self.belongs_to_entity(entry))
    }

    fn notify_failure(&self, action: &str, title: &str, err: &CatalogError) {
        warn!(action, title, error = %err, "Book mutation failed");
        self.notifier.notify(NotificationEvent::Error {
            message: format!("Failed to {action} '{title}': {err}"),
        });
    }
}

fn reinsert(entry: &mut CacheEntry, removal: &Removal) -> bool {
    let Some(current) = entry.shared_data() else {
        return false;
    };
    if current.contains(removal.book.id) {
        return false;
    }

    let mut page = BookPage::clone(current);
    let index = removal.index.min(page.items.len());
    page.items.insert(index, removal.book.clone());
    page.total_count += 1;
    entry.replace_data(Arc::new(page));
    entry.mark_stale();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::key::build_key;
    use crate::query::state::ViewState;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<NotificationEvent>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, event: NotificationEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    struct ScriptedTransport {
        delete_result: Result<(), CatalogError>,
    }

    #[async_trait::async_trait]
    impl CatalogTransport for ScriptedTransport {
        async fn search(&self, _key: &QueryKey) -> Result<BookPage, CatalogError> {
            Ok(BookPage::default())
        }

        async fn get(&self, id: BookId) -> Result<Book, CatalogError> {
            Err(CatalogError::not_found("Book", id))
        }

        async fn delete(&self, _id: BookId) -> Result<(), CatalogError> {
            self.delete_result.clone()
        }

        async fn create(&self, book: &Book) -> Result<Book, CatalogError> {
            let mut created = book.clone();
            created.id = BookId::new(100);
            Ok(created)
        }

        async fn update(&self, book: &Book) -> Result<Book, CatalogError> {
            Ok(book.clone())
        }
    }

    fn book(id: i64) -> Book {
        Book {
            id: BookId::new(id),
            isbn: String::new(),
            title: format!("Book {id}"),
            author: String::new(),
            publisher: None,
            description: None,
            language: None,
            location: None,
            category: None,
        }
    }

    fn key(page: u32) -> QueryKey {
        build_key(&EntityTag::books(), &ViewState::new(3).with_page(page))
    }

    fn seeded_cache() -> Arc<ResultCache> {
        let cache = Arc::new(ResultCache::new());
        let page1 = BookPage::new(vec![book(1), book(2), book(3)], 9);
        let page2 = BookPage::new(vec![book(4), book(5), book(6)], 9);
        cache.put(CacheEntry::success(key(1), page1));
        cache.put(CacheEntry::success(key(2), page2));
        cache
    }

    fn hook(
        cache: &Arc<ResultCache>,
        delete_result: Result<(), CatalogError>,
    ) -> (MutationHook, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let hook = MutationHook::new(
            Arc::clone(cache),
            Arc::new(ScriptedTransport { delete_result }),
            notifier.clone(),
            EntityTag::books(),
        );
        (hook, notifier)
    }

    #[tokio::test]
    async fn successful_delete_commits_and_invalidates() {
        let cache = seeded_cache();
        let (hook, notifier) = hook(&cache, Ok(()));

        let outcome = hook.delete_record(BookId::new(2)).await.unwrap();
        assert_eq!(outcome.touched_entries, 1);
        assert_eq!(outcome.invalidated_entries, 2);

        let page1 = cache.get(&key(1)).unwrap();
        let ids: Vec<_> = page1.data().unwrap().items.iter().map(|b| b.id.value()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(page1.data().unwrap().total_count, 8);
        assert!(page1.is_stale());

        let page2 = cache.get(&key(2)).unwrap();
        assert_eq!(page2.data().unwrap().total_count, 9);
        assert!(page2.is_stale());

        assert_eq!(
            notifier.events.lock().unwrap().as_slice(),
            &[NotificationEvent::BookDeleted { id: BookId::new(2) }]
        );
    }

    #[tokio::test]
    async fn failed_delete_restores_record_in_place() {
        let cache = seeded_cache();
        let before = cache.get(&key(1)).unwrap();
        let (hook, notifier) = hook(&cache, Err(CatalogError::transport(Some(500), "boom")));

        let err = hook.delete_record(BookId::new(2)).await.unwrap_err();
        assert_eq!(err, CatalogError::transport(Some(500), "boom"));

        let after = cache.get(&key(1)).unwrap();
        assert_eq!(after.data(), before.data());
        assert!(!after.is_stale());

        let events = notifier.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_error());
    }

    #[tokio::test]
    async fn rollback_marks_refreshed_pages_stale() {
        let cache = seeded_cache();
        let (hook, _) = hook(&cache, Err(CatalogError::not_found("Book", 2)));

        let removals = hook.remove_optimistically(BookId::new(2));
        let fresh = BookPage::new(vec![book(1), book(3), book(7)], 8);
        cache.put(CacheEntry::success(key(1), fresh.clone()));

        assert_eq!(hook.roll_back(BookId::new(2), &removals), 1);
        let entry = cache.get(&key(1)).unwrap();
        assert_eq!(entry.data(), Some(&fresh));
        assert!(entry.is_stale());
    }

    #[tokio::test]
    async fn rollback_reinserts_into_pages_edited_in_place() {
        let cache = seeded_cache();
        let (hook, _) = hook(&cache, Ok(()));

        let removals = hook.remove_optimistically(BookId::new(2));
        let mut edited = book(3);
        edited.title = "Renamed".to_string();
        assert_eq!(hook.patch_cached_copies(&edited), 1);

        assert_eq!(hook.roll_back(BookId::new(2), &removals), 1);
        let entry = cache.get(&key(1)).unwrap();
        let page = entry.data().unwrap();
        let ids: Vec<_> = page.items.iter().map(|b| b.id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(page.items[2].title, "Renamed");
        assert_eq!(page.total_count, 9);
        assert!(entry.is_stale());
    }

    #[tokio::test]
    async fn overlapping_removals_undo_independently() {
        let cache = seeded_cache();
        let (hook, _) = hook(&cache, Ok(()));
        let before = cache.get(&key(1)).unwrap();

        let first = hook.remove_optimistically(BookId::new(1));
        let second = hook.remove_optimistically(BookId::new(2));
        assert_eq!(cache.get(&key(1)).unwrap().data().unwrap().total_count, 7);

        hook.roll_back(BookId::new(1), &first);
        let page = cache.get(&key(1)).unwrap();
        let ids: Vec<_> = page.data().unwrap().items.iter().map(|b| b.id.value()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(page.data().unwrap().total_count, 8);

        hook.roll_back(BookId::new(2), &second);
        let after = cache.get(&key(1)).unwrap();
        assert_eq!(after.data(), before.data());
        assert!(!after.is_stale());
        assert!(hook.pending().is_empty());
    }

    #[tokio::test]
    async fn confirmed_removal_survives_rollback_of_an_overlapping_one() {
        let cache = seeded_cache();
        let (hook, _) = hook(&cache, Ok(()));

        let first = hook.remove_optimistically(BookId::new(1));
        let second = hook.remove_optimistically(BookId::new(2));
        hook.commit(BookId::new(1), &first);
        hook.roll_back(BookId::new(2), &second);

        let page = cache.get(&key(1)).unwrap();
        let ids: Vec<_> = page.data().unwrap().items.iter().map(|b| b.id.value()).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(page.data().unwrap().total_count, 8);
        assert!(hook.pending().is_empty());
    }

    #[tokio::test]
    async fn other_entities_are_untouched() {
        let cache = seeded_cache();
        let members = build_key(&EntityTag::new("members"), &ViewState::new(3));
        cache.put(CacheEntry::success(
            members.clone(),
            BookPage::new(vec![book(2)], 1),
        ));
        let (hook, _) = hook(&cache, Ok(()));

        hook.delete_record(BookId::new(2)).await.unwrap();
        let entry = cache.get(&members).unwrap();
        assert_eq!(entry.data().unwrap().items.len(), 1);
        assert!(!entry.is_stale());
    }

    #[tokio::test]
    async fn update_patches_cached_copies() {
        let cache = seeded_cache();
        let (hook, notifier) = hook(&cache, Ok(()));

        let mut edited = book(5);
        edited.title = "Renamed".to_string();
        hook.update_record(&edited).await.unwrap();

        let page2 = cache.get(&key(2)).unwrap();
        assert_eq!(page2.data().unwrap().items[1].title, "Renamed");
        assert!(page2.is_stale());
        assert!(matches!(
            notifier.events.lock().unwrap()[0],
            NotificationEvent::BookSaved { .. }
        ));
    }

    #[tokio::test]
    async fn create_invalidates_entity() {
        let cache = seeded_cache();
        let (hook, _) = hook(&cache, Ok(()));

        let created = hook.create_record(&book(0)).await.unwrap();
        assert_eq!(created.id, BookId::new(100));
        assert!(cache.get(&key(1)).unwrap().is_stale());
        assert!(cache.get(&key(2)).unwrap().is_stale());
    }
}
