//! User-editable listing parameters and the transitions between them.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::CatalogConfig;
use crate::domain::{SortField, SortOrder};
use crate::models::book::page_count;
use crate::query::error::CatalogError;

/// Parameters of one listing view.
///
/// A plain value: invariants (`page >= 1`, allowed page size) are enforced by
/// [`ViewStateMachine`], which owns the live instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    page: u32,
    page_size: u32,
    search_text: String,
    filters: BTreeMap<String, String>,
    sort_field: SortField,
    sort_order: SortOrder,
}

impl ViewState {
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size,
            search_text: String::new(),
            filters: BTreeMap::new(),
            sort_field: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }

    #[must_use]
    pub const fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search_text = text.into();
        self
    }

    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_filter(field, value);
        self
    }

    #[must_use]
    pub const fn with_sort(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort_field = field;
        self.sort_order = order;
        self
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    #[must_use]
    pub const fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    #[must_use]
    pub const fn sort_field(&self) -> SortField {
        self.sort_field
    }

    #[must_use]
    pub const fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// An empty value is the "no filter" sentinel and removes the field.
    pub(crate) fn insert_filter(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        if value.is_empty() {
            self.filters.remove(&field);
        } else {
            self.filters.insert(field, value);
        }
    }
}

/// Owns the [`ViewState`] of one view and applies transitions to it.
///
/// Every transition returns whether the state changed; callers derive a new
/// query key and fetch only when it did. Invalid input is rejected before the
/// state is touched.
#[derive(Debug, Clone)]
pub struct ViewStateMachine {
    state: ViewState,
    allowed_page_sizes: Vec<u32>,
    known_total: Option<u64>,
}

impl ViewStateMachine {
    pub fn new(initial: ViewState, allowed_page_sizes: Vec<u32>) -> Result<Self, CatalogError> {
        if allowed_page_sizes.is_empty() {
            return Err(CatalogError::validation(
                "At least one page size must be allowed",
            ));
        }

        let machine = Self {
            state: initial,
            allowed_page_sizes,
            known_total: None,
        };
        machine.check_page_size(machine.state.page_size)?;
        if machine.state.page == 0 {
            return Err(CatalogError::validation("Page numbers start at 1"));
        }
        Ok(machine)
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let initial = ViewState::new(config.default_page_size)
            .with_sort(config.default_sort_field, config.default_sort_order);
        Self::new(initial, config.page_sizes.clone())
    }

    #[must_use]
    pub const fn state(&self) -> &ViewState {
        &self.state
    }

    #[must_use]
    pub fn allowed_page_sizes(&self) -> &[u32] {
        &self.allowed_page_sizes
    }

    #[must_use]
    pub const fn known_total(&self) -> Option<u64> {
        self.known_total
    }

    /// Number of pages for the current parameters, once a total is known.
    #[must_use]
    pub fn page_count(&self) -> Option<u32> {
        self.known_total
            .map(|total| page_count(total, self.state.page_size))
    }

    /// Records the total reported for the current parameters, enabling page clamping.
    pub const fn observe_total(&mut self, total: u64) {
        self.known_total = Some(total);
    }

    /// Updates the free-text query and returns to page 1.
    pub fn set_search(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text == self.state.search_text && self.state.page == 1 {
            return false;
        }

        debug!(search = %text, "View search changed");
        self.state.search_text = text;
        self.state.page = 1;
        self.known_total = None;
        true
    }

    /// Sets or clears (empty `value`) one filter and returns to page 1.
    pub fn set_filter(
        &mut self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<bool, CatalogError> {
        let field = field.into();
        let value = value.into();

        if field.is_empty() {
            return Err(CatalogError::validation("Filter field name cannot be empty"));
        }

        let unchanged = match self.state.filters.get(&field) {
            Some(current) => *current == value,
            None => value.is_empty(),
        };
        if unchanged && self.state.page == 1 {
            return Ok(false);
        }

        debug!(field = %field, value = %value, "View filter changed");
        self.state.insert_filter(field, value);
        self.state.page = 1;
        self.known_total = None;
        Ok(true)
    }

    /// Toggles the direction when `field` is already the sort column, otherwise
    /// sorts ascending by `field`. The page is kept.
    pub fn set_sort(&mut self, field: SortField) -> bool {
        if field == self.state.sort_field {
            self.state.sort_order = self.state.sort_order.toggled();
        } else {
            self.state.sort_field = field;
            self.state.sort_order = SortOrder::Ascending;
        }

        debug!(
            field = %self.state.sort_field,
            order = %self.state.sort_order,
            "View sort changed"
        );
        true
    }

    /// Moves to page `page`, clamped to the known page count.
    ///
    /// Before the first total is known any positive page is accepted as is.
    pub fn set_page(&mut self, page: u32) -> Result<bool, CatalogError> {
        if page == 0 {
            return Err(CatalogError::validation(
                "Invalid page: 0. Page numbers start at 1",
            ));
        }

        let page = match self.page_count() {
            Some(count) => page.clamp(1, count.max(1)),
            None => page,
        };

        if page == self.state.page {
            return Ok(false);
        }

        self.state.page = page;
        Ok(true)
    }

    pub fn next_page(&mut self) -> Result<bool, CatalogError> {
        self.set_page(self.state.page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> Result<bool, CatalogError> {
        if self.state.page <= 1 {
            return Ok(false);
        }
        self.set_page(self.state.page - 1)
    }

    /// Changes the page size (must be one of the allowed sizes) and returns to page 1.
    pub fn set_page_size(&mut self, page_size: u32) -> Result<bool, CatalogError> {
        self.check_page_size(page_size)?;

        if page_size == self.state.page_size && self.state.page == 1 {
            return Ok(false);
        }

        self.state.page_size = page_size;
        self.state.page = 1;
        Ok(true)
    }

    fn check_page_size(&self, page_size: u32) -> Result<(), CatalogError> {
        if self.allowed_page_sizes.contains(&page_size) {
            return Ok(());
        }

        let allowed: Vec<String> = self
            .allowed_page_sizes
            .iter()
            .map(ToString::to_string)
            .collect();
        Err(CatalogError::validation(format!(
            "Unsupported page size: {page_size}. Allowed sizes: {}",
            allowed.join(", ")
        )))
    }
}
