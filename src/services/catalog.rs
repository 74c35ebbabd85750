use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{CatalogConfig, Config};
use crate::domain::{BookId, EntityTag};
use crate::models::book::Book;
use crate::query::{
    CatalogError, CatalogTransport, CatalogView, DeleteOutcome, FetchCoordinator, MutationHook,
    Notifier, ResultCache, ViewState, ViewStateMachine,
};

/// Entry point of the catalog: owns the shared cache and hands out views.
///
/// Every view opened from one service shares its cache, so two views showing
/// the same query share one request and one entry.
pub struct CatalogService {
    entity: EntityTag,
    catalog: CatalogConfig,
    cache: Arc<ResultCache>,
    coordinator: Arc<FetchCoordinator>,
    mutations: Arc<MutationHook>,
}

impl CatalogService {
    #[must_use]
    pub fn new(
        config: &Config,
        transport: Arc<dyn CatalogTransport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let entity = config.catalog.entity_tag();
        let cache = Arc::new(ResultCache::with_max_entries(config.cache.max_entries));
        let coordinator = Arc::new(FetchCoordinator::new(
            Arc::clone(&cache),
            Arc::clone(&transport),
        ));
        let mutations = Arc::new(MutationHook::new(
            Arc::clone(&cache),
            transport,
            notifier,
            entity.clone(),
        ));

        Self {
            entity,
            catalog: config.catalog.clone(),
            cache,
            coordinator,
            mutations,
        }
    }

    #[must_use]
    pub const fn entity(&self) -> &EntityTag {
        &self.entity
    }

    #[must_use]
    pub const fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Opens a view in the configured default state and starts fetching its first page.
    pub fn open_view(&self) -> Result<CatalogView, CatalogError> {
        let machine = ViewStateMachine::from_config(&self.catalog)?;
        Ok(self.start(machine))
    }

    /// Opens a view in `state`, which must use one of the configured page sizes.
    pub fn open_view_at(&self, state: ViewState) -> Result<CatalogView, CatalogError> {
        let machine = ViewStateMachine::new(state, self.catalog.page_sizes.clone())?;
        Ok(self.start(machine))
    }

    fn start(&self, machine: ViewStateMachine) -> CatalogView {
        let mut view = CatalogView::new(
            self.entity.clone(),
            machine,
            Arc::clone(&self.coordinator),
            Arc::clone(&self.mutations),
        );
        let disposition = view.refresh();
        debug!(key = %view.key(), ?disposition, "Opened catalog view");
        view
    }

    /// Looks a record up in the cached pages first and asks the server only
    /// when no fresh cached page holds it.
    pub async fn book(&self, id: BookId) -> Result<Book, CatalogError> {
        let cached = self
            .cache
            .entries(|entry| entry.key().entity() == &self.entity && !entry.needs_fetch())
            .into_iter()
            .find_map(|entry| entry.data().and_then(|page| page.find(id)).cloned());

        if let Some(book) = cached {
            debug!(id = %id, "Serving book from cached page");
            return Ok(book);
        }

        self.coordinator.transport().get(id).await
    }

    pub async fn delete_book(&self, id: BookId) -> Result<DeleteOutcome, CatalogError> {
        self.mutations.delete_record(id).await
    }

    pub async fn create_book(&self, book: &Book) -> Result<Book, CatalogError> {
        let created = self.mutations.create_record(book).await?;
        info!(id = %created.id, title = %created.title, "Created book");
        Ok(created)
    }

    pub async fn update_book(&self, book: &Book) -> Result<Book, CatalogError> {
        let updated = self.mutations.update_record(book).await?;
        info!(id = %updated.id, title = %updated.title, "Updated book");
        Ok(updated)
    }

    /// Drops cached pages of this entity. Returns how many were removed.
    pub fn evict_all(&self) -> usize {
        self.cache
            .evict(|entry| entry.key().entity() == &self.entity && !entry.is_pending())
    }
}
