//! One listing view: its state machine, its subscription and what it shows.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::{BookId, EntityTag, SortField};
use crate::models::book::Book;
use crate::query::cache::CacheStatus;
use crate::query::coordinator::{FetchCoordinator, FetchDisposition, Subscription};
use crate::query::error::CatalogError;
use crate::query::key::{QueryKey, build_key};
use crate::query::mutation::{DeleteOutcome, MutationHook};
use crate::query::state::{ViewState, ViewStateMachine};

/// Read-only picture of a view for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub status: CacheStatus,
    pub items: Vec<Book>,
    pub total_count: u64,
    pub error: Option<String>,
    pub page: u32,
    pub page_size: u32,
    pub page_count: Option<u32>,
    /// `items` belong to the previously rendered query while this one loads.
    pub is_placeholder: bool,
    pub is_stale: bool,
}

impl Snapshot {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self.status, CacheStatus::Pending)
    }
}

/// A view instance bound to the shared cache.
///
/// Transitions are validated first; a rejected transition leaves the state and
/// the cache untouched. Every accepted transition re-derives the query key and
/// asks the coordinator for it, so re-selecting the current page also retries
/// a failed or stale entry. Dropping the view ends its subscription without
/// cancelling requests in flight.
pub struct CatalogView {
    entity: EntityTag,
    machine: ViewStateMachine,
    coordinator: Arc<FetchCoordinator>,
    mutations: Arc<MutationHook>,
    subscription: Option<Subscription>,
    last_rendered: Option<QueryKey>,
}

impl CatalogView {
    #[must_use]
    pub const fn new(
        entity: EntityTag,
        machine: ViewStateMachine,
        coordinator: Arc<FetchCoordinator>,
        mutations: Arc<MutationHook>,
    ) -> Self {
        Self {
            entity,
            machine,
            coordinator,
            mutations,
            subscription: None,
            last_rendered: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &ViewState {
        self.machine.state()
    }

    #[must_use]
    pub fn allowed_page_sizes(&self) -> &[u32] {
        self.machine.allowed_page_sizes()
    }

    #[must_use]
    pub fn key(&self) -> QueryKey {
        build_key(&self.entity, self.machine.state())
    }

    /// Fetches (or joins, or reads from cache) the current key.
    pub fn refresh(&mut self) -> FetchDisposition {
        let subscription = self.coordinator.ensure_fetched(&self.key());
        let disposition = subscription.disposition();
        self.subscription = Some(subscription);
        disposition
    }

    /// Re-issues the request for the current key even if it is cached.
    pub fn reload(&mut self) {
        self.subscription = Some(self.coordinator.refetch(&self.key()));
    }

    pub fn set_search(&mut self, text: impl Into<String>) -> FetchDisposition {
        self.machine.set_search(text);
        self.refresh()
    }

    pub fn set_filter(
        &mut self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<FetchDisposition, CatalogError> {
        self.machine.set_filter(field, value)?;
        Ok(self.refresh())
    }

    pub fn set_sort(&mut self, field: SortField) -> FetchDisposition {
        self.machine.set_sort(field);
        self.refresh()
    }

    pub fn set_page(&mut self, page: u32) -> Result<FetchDisposition, CatalogError> {
        self.observe_current_total();
        self.machine.set_page(page)?;
        Ok(self.refresh())
    }

    pub fn next_page(&mut self) -> Result<FetchDisposition, CatalogError> {
        self.observe_current_total();
        self.machine.next_page()?;
        Ok(self.refresh())
    }

    pub fn previous_page(&mut self) -> Result<FetchDisposition, CatalogError> {
        self.machine.previous_page()?;
        Ok(self.refresh())
    }

    pub fn set_page_size(&mut self, page_size: u32) -> Result<FetchDisposition, CatalogError> {
        self.machine.set_page_size(page_size)?;
        Ok(self.refresh())
    }

    /// Deletes a record through the shared mutation hook.
    pub async fn delete(&self, id: BookId) -> Result<DeleteOutcome, CatalogError> {
        self.mutations.delete_record(id).await
    }

    /// Current picture of the view, keeping the last rendered page on screen
    /// while a never-seen key loads.
    pub fn snapshot(&mut self) -> Snapshot {
        let key = self.key();
        let cache = self.coordinator.cache();
        let current = cache.get(&key);
        let shown = cache.get_or_previous(&key, self.last_rendered.as_ref());

        let is_placeholder = shown.as_ref().is_some_and(|entry| *entry.key() != key);

        if let Some(page) = current.as_ref().and_then(|entry| entry.data()) {
            self.machine.observe_total(page.total_count);
            self.last_rendered = Some(key);
        }

        let (items, total_count) = shown
            .as_ref()
            .and_then(|entry| entry.data())
            .map(|page| (page.items.clone(), page.total_count))
            .unwrap_or_default();

        Snapshot {
            status: current
                .as_ref()
                .map_or(CacheStatus::Pending, |entry| entry.status()),
            items,
            total_count,
            error: current
                .as_ref()
                .and_then(|entry| entry.error())
                .map(ToString::to_string),
            page: self.machine.state().page(),
            page_size: self.machine.state().page_size(),
            page_count: self.machine.page_count(),
            is_placeholder,
            is_stale: current.as_ref().is_some_and(|entry| entry.is_stale()),
        }
    }

    /// Waits until what [`Self::snapshot`] would return has changed.
    /// Returns `false` when there is nothing left to wait for.
    pub async fn changed(&mut self) -> bool {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.changed().await,
            None => false,
        }
    }

    /// Waits for the current key to settle and returns the resulting snapshot.
    pub async fn settled(&mut self) -> Result<Snapshot, CatalogError> {
        if self.subscription.is_none() {
            self.refresh();
        }
        if let Some(subscription) = self.subscription.as_mut() {
            subscription.settled().await?;
        }
        Ok(self.snapshot())
    }

    /// Stops receiving updates. Requests in flight still fill the cache.
    pub fn close(&mut self) {
        self.subscription = None;
    }

    fn observe_current_total(&mut self) {
        let total = self
            .coordinator
            .cache()
            .get(&self.key())
            .and_then(|entry| entry.data().map(|page| page.total_count));
        if let Some(total) = total {
            self.machine.observe_total(total);
        }
    }
}
